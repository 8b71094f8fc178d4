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

//! A reference-counted cancellation flag shared between a long-running task
//! (a mining candidate, a compression job) and the worker threads that were
//! handed a snapshot of it. Cloning a `StopFlag` shares the same underlying
//! `AtomicBool`; a worker that captured one while holding its pool's mutex
//! keeps observing the right flag even after the owner installs a new task,
//! because the flag outlives the task object.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
	pub fn new() -> Self {
		StopFlag(Arc::new(AtomicBool::new(false)))
	}

	pub fn set(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_set(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}

	/// True if `self` and `other` refer to the same underlying flag, i.e. no
	/// soft restart happened between the two snapshots.
	pub fn same(&self, other: &StopFlag) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn clones_share_state() {
		let a = StopFlag::new();
		let b = a.clone();
		assert!(!a.is_set());
		b.set();
		assert!(a.is_set());
	}

	#[test]
	fn fresh_flags_are_distinct() {
		let a = StopFlag::new();
		let b = StopFlag::new();
		assert!(!a.same(&b));
	}
}
