// Copyright 2018 The Grin Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Keeps exactly one outstanding request per `(BlockId, is_body)` pair and
//! hands it to a single peer at a time: a task arena plus an unassigned
//! list, reassigned reactively as each block/body is requested rather than
//! discovered through a periodic difficulty poll.

use std::collections::{HashSet, VecDeque};

use log::debug;
use parking_lot::Mutex;

use veil_core::{BlockId, PeerId, TaskKey};

/// A single outstanding request, owned by at most one peer at a time
/// (invariant: a `TaskKey` never appears assigned to two peers
/// simultaneously).
#[derive(Debug, Clone)]
struct Task {
	key: TaskKey,
	owner: Option<PeerId>,
}

struct Inner {
	tasks: std::collections::HashMap<TaskKey, Task>,
	unassigned: VecDeque<TaskKey>,
}

/// The task arena. Thread-safety comes from a single mutex rather than the
/// single-reactor-thread ownership grin's sync loop relies on, since the
/// scheduler here is also touched by the verifier pool's completion
/// callbacks.
pub struct Scheduler {
	inner: Mutex<Inner>,
}

impl Scheduler {
	pub fn new() -> Scheduler {
		Scheduler {
			inner: Mutex::new(Inner {
				tasks: std::collections::HashMap::new(),
				unassigned: VecDeque::new(),
			}),
		}
	}

	/// Ensure a task exists for `(id, is_body)`; if it's new, queue it as
	/// unassigned and return `true` so the caller tries to assign it right
	/// away.
	pub fn request(&self, id: BlockId, is_body: bool) -> bool {
		let key = TaskKey::new(id, is_body);
		let mut inner = self.inner.lock();
		if inner.tasks.contains_key(&key) {
			return false;
		}
		inner.tasks.insert(key, Task { key, owner: None });
		inner.unassigned.push_back(key);
		true
	}

	/// Whether `key` is still tracked at all (used by `ShouldAssignTask`:
	/// the processor may have stopped wanting it between the request and
	/// the assignment attempt).
	pub fn is_tracked(&self, key: &TaskKey) -> bool {
		self.inner.lock().tasks.contains_key(key)
	}

	/// Record that `key` is now carried by `owner`.
	pub fn mark_assigned(&self, key: TaskKey, owner: PeerId) {
		let mut inner = self.inner.lock();
		if let Some(task) = inner.tasks.get_mut(&key) {
			task.owner = Some(owner);
		}
		inner.unassigned.retain(|k| *k != key);
	}

	/// A task completed (accepted, rejected as stale, or its owner
	/// disconnected/timed out) and should leave the arena entirely.
	pub fn complete(&self, key: &TaskKey) {
		let mut inner = self.inner.lock();
		inner.tasks.remove(key);
		inner.unassigned.retain(|k| k != key);
	}

	/// An owner gave up on `key` (timeout or `DataMissing`) without the
	/// task itself being resolved; put it back in the unassigned queue so
	/// another peer can pick it up.
	pub fn requeue(&self, key: TaskKey) {
		let mut inner = self.inner.lock();
		if let Some(task) = inner.tasks.get_mut(&key) {
			task.owner = None;
			if !inner.unassigned.contains(&key) {
				inner.unassigned.push_back(key);
			}
		}
	}

	/// Every task with no owner, in request order, for the reactor's
	/// assignment pass.
	pub fn unassigned(&self) -> Vec<TaskKey> {
		self.inner.lock().unassigned.iter().cloned().collect()
	}

	/// Remove any tracked task whose key isn't in `wanted` (called after
	/// `RefreshCongestions` re-enumerates everything the processor still
	/// needs, so stale entries left over from a reorg are dropped).
	pub fn retain_wanted(&self, wanted: &HashSet<TaskKey>) {
		let mut inner = self.inner.lock();
		let stale: Vec<TaskKey> = inner.tasks.keys().filter(|k| !wanted.contains(k)).cloned().collect();
		for key in stale {
			debug!("dropping unassigned task no longer wanted: {}", key);
			inner.tasks.remove(&key);
			inner.unassigned.retain(|k| *k != key);
		}
	}

	pub fn len(&self) -> usize {
		self.inner.lock().tasks.len()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use veil_core::Hash;

	fn id(h: u64) -> BlockId {
		BlockId { height: h, hash: Hash::from_vec(&h.to_be_bytes()) }
	}

	#[test]
	fn requesting_twice_is_idempotent() {
		let s = Scheduler::new();
		assert!(s.request(id(1), false));
		assert!(!s.request(id(1), false));
		assert_eq!(s.len(), 1);
	}

	#[test]
	fn requeue_after_timeout_reappears_unassigned() {
		let s = Scheduler::new();
		s.request(id(1), false);
		let key = TaskKey::new(id(1), false);
		let peer = PeerId([1u8; 32]);
		s.mark_assigned(key, peer);
		assert!(s.unassigned().is_empty());
		s.requeue(key);
		assert_eq!(s.unassigned(), vec![key]);
	}

	#[test]
	fn retain_wanted_drops_stale_tasks() {
		let s = Scheduler::new();
		s.request(id(1), false);
		s.request(id(2), false);
		let mut wanted = HashSet::new();
		wanted.insert(TaskKey::new(id(2), false));
		s.retain_wanted(&wanted);
		assert_eq!(s.len(), 1);
	}
}
