// Copyright 2016 The Grin Developers
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

//! Tracks transaction ids we've heard about (`HaveTransaction`) but don't
//! have yet, and re-solicits them with a single shared timer armed for the
//! head of the queue: one FIFO, a hash set for membership, and
//! `Delete`/`SetTimer`/`OnTimer` as the only mutators.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use veil_core::TxId;

pub struct WantedTx {
	queue: VecDeque<TxId>,
	members: HashSet<TxId>,
	deadline: Option<Instant>,
	timeout: Duration,
}

impl WantedTx {
	pub fn new(timeout: Duration) -> WantedTx {
		WantedTx {
			queue: VecDeque::new(),
			members: HashSet::new(),
			deadline: None,
			timeout,
		}
	}

	pub fn contains(&self, id: &TxId) -> bool {
		self.members.contains(id)
	}

	/// Record that we want `id`. Returns `true` if it's new (the caller
	/// should send a `GetTransaction`), `false` if already pending.
	pub fn want(&mut self, id: TxId) -> bool {
		if !self.members.insert(id) {
			return false;
		}
		let was_empty = self.queue.is_empty();
		self.queue.push_back(id);
		if was_empty {
			self.set_timer();
		}
		true
	}

	/// Cancel solicitation for `id`, whether because it arrived directly
	/// (`NewTransaction`) or because retries gave up. Re-arms the timer for
	/// the new head if `id` was the head.
	pub fn delete(&mut self, id: &TxId) {
		if !self.members.remove(id) {
			return;
		}
		if let Some(pos) = self.queue.iter().position(|t| t == id) {
			let was_head = pos == 0;
			self.queue.remove(pos);
			if was_head {
				self.set_timer();
			}
		}
	}

	fn set_timer(&mut self) {
		self.deadline = if self.queue.is_empty() {
			None
		} else {
			Some(Instant::now() + self.timeout)
		};
	}

	/// Fired by the reactor's timer loop. Every head entry whose wait has
	/// reached the timeout is dropped from the structures entirely and
	/// returned, so the caller can broadcast `GetTransaction` for it to
	/// every spreading peer ("ask everyone" opportunistic refetch, since the
	/// original advertiser is no longer tracked once this fires). Rearms
	/// from whatever is left at the new head.
	pub fn on_timer(&mut self, now: Instant) -> Vec<TxId> {
		let mut fired = Vec::new();
		while let Some(deadline) = self.deadline {
			if now < deadline {
				break;
			}
			let id = match self.queue.pop_front() {
				Some(id) => id,
				None => break,
			};
			self.members.remove(&id);
			fired.push(id);
			self.set_timer();
		}
		fired
	}

	pub fn len(&self) -> usize {
		self.queue.len()
	}

	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn id(b: u8) -> TxId {
		veil_core::Hash::from_vec(&[b])
	}

	#[test]
	fn wanting_twice_is_a_no_op() {
		let mut w = WantedTx::new(Duration::from_millis(100));
		assert!(w.want(id(1)));
		assert!(!w.want(id(1)));
		assert_eq!(w.len(), 1);
	}

	#[test]
	fn delete_removes_and_rearms_for_new_head() {
		let mut w = WantedTx::new(Duration::from_millis(100));
		w.want(id(1));
		w.want(id(2));
		w.delete(&id(1));
		assert!(!w.contains(&id(1)));
		assert_eq!(w.len(), 1);
		assert!(w.deadline.is_some());
	}

	#[test]
	fn timer_permanently_drops_every_overdue_head_entry() {
		let mut w = WantedTx::new(Duration::from_millis(0));
		w.want(id(1));
		w.want(id(2));
		let now = Instant::now() + Duration::from_millis(1);
		let fired = w.on_timer(now);
		assert_eq!(fired, vec![id(1), id(2)]);
		assert!(w.is_empty());
		assert!(!w.contains(&id(1)));
		assert!(!w.contains(&id(2)));
	}

	#[test]
	fn timer_before_deadline_fires_nothing() {
		let mut w = WantedTx::new(Duration::from_secs(10));
		w.want(id(1));
		assert!(w.on_timer(Instant::now()).is_empty());
		assert!(w.contains(&id(1)));
	}

	#[test]
	fn direct_receipt_cancels_solicitation() {
		let mut w = WantedTx::new(Duration::from_millis(1000));
		w.want(id(1));
		w.delete(&id(1));
		assert!(w.is_empty());
		assert!(w.deadline.is_none());
	}
}
