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

//! Shim between the Node and an external mempool. The actual validation
//! arithmetic (fee/size/kernel checks) belongs to the [`Mempool`]
//! implementor; this module only decides what to accept, what to relay and
//! when to prune, and owns the solicitation timer for ids we don't have yet.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::Mutex;

use veil_core::TxId;

use crate::wanted_tx::WantedTx;

/// Maximum number of transactions kept in the pool at once (the
/// `MaxPoolTransactions`); oldest-accepted are dropped first once full.
pub const MAX_POOL_TRANSACTIONS: usize = 50_000;

/// The actual mempool: validation, storage and fee-ordering. Implemented
/// outside this crate (the contract VM/consensus layer); `TxPool` only ever
/// calls through this trait.
pub trait Mempool: Send + Sync {
	fn contains(&self, id: &TxId) -> bool;
	/// Validate and insert. `Ok(Some(id))` means newly accepted, `Ok(None)`
	/// means it was already present, `Err` means invalid (protocol
	/// violation territory for whoever sent it).
	fn validate_and_insert(&self, bytes: &[u8]) -> Result<Option<TxId>, String>;
	fn get_bytes(&self, id: &TxId) -> Option<Vec<u8>>;
	/// Evict to bring the pool back under `max_size`, oldest first.
	fn prune_to(&self, max_size: usize);
	fn size(&self) -> usize;
	/// Drop anything that the chain tip has since cleared (confirmed or
	/// made invalid), called on every new state (`OnTransactionCleared`).
	fn on_new_tip(&self, tip_height: u64);
}

struct Inner {
	order: VecDeque<TxId>,
}

/// Accept/relay/prune glue wired to an external `Mempool`. `id_want` tracks
/// ids a peer announced that we don't have yet.
pub struct TxPool<M: Mempool> {
	mempool: M,
	order: Mutex<Inner>,
	pub wanted: Mutex<WantedTx>,
}

impl<M: Mempool> TxPool<M> {
	pub fn new(mempool: M) -> TxPool<M> {
		TxPool {
			mempool,
			order: Mutex::new(Inner { order: VecDeque::new() }),
			wanted: Mutex::new(WantedTx::new(Duration::from_secs(10))),
		}
	}

	pub fn contains(&self, id: &TxId) -> bool {
		self.mempool.contains(id)
	}

	/// A transaction arrived, either pushed (`NewTransaction`) or fetched
	/// (`GetTransaction` reply). Returns whether it was newly accepted, so
	/// the caller knows to relay `HaveTransaction` to other peers and clear
	/// any pending solicitation.
	pub fn accept(&self, bytes: &[u8]) -> bool {
		match self.mempool.validate_and_insert(bytes) {
			Ok(Some(id)) => {
				self.order.lock().order.push_back(id);
				self.wanted.lock().delete(&id);
				self.enforce_cap();
				true
			}
			Ok(None) => false,
			Err(e) => {
				debug!("rejected transaction: {}", e);
				false
			}
		}
	}

	/// A peer advertised `id` and we don't have it; returns `true` if this
	/// is new and the caller should send `GetTransaction`.
	pub fn on_have(&self, id: TxId) -> bool {
		if self.mempool.contains(&id) {
			return false;
		}
		self.wanted.lock().want(id)
	}

	pub fn get_bytes(&self, id: &TxId) -> Option<Vec<u8>> {
		self.mempool.get_bytes(id)
	}

	pub fn on_new_tip(&self, tip_height: u64) {
		self.mempool.on_new_tip(tip_height);
	}

	/// Drive the solicitation timer; every id returned has already been
	/// dropped from `wanted` and needs a `GetTransaction` broadcast to every
	/// spreading peer.
	pub fn fire_wanted_timer(&self, now: Instant) -> Vec<TxId> {
		self.wanted.lock().on_timer(now)
	}

	fn enforce_cap(&self) {
		if self.mempool.size() <= MAX_POOL_TRANSACTIONS {
			return;
		}
		self.mempool.prune_to(MAX_POOL_TRANSACTIONS);
		let mut inner = self.order.lock();
		while inner.order.len() > MAX_POOL_TRANSACTIONS {
			inner.order.pop_front();
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::collections::HashSet;
	use std::sync::Mutex as StdMutex;

	struct FakeMempool {
		txs: StdMutex<HashSet<TxId>>,
	}

	impl Mempool for FakeMempool {
		fn contains(&self, id: &TxId) -> bool {
			self.txs.lock().unwrap().contains(id)
		}
		fn validate_and_insert(&self, bytes: &[u8]) -> Result<Option<TxId>, String> {
			let id = veil_core::Hash::from_vec(bytes);
			let mut txs = self.txs.lock().unwrap();
			if txs.insert(id) {
				Ok(Some(id))
			} else {
				Ok(None)
			}
		}
		fn get_bytes(&self, _id: &TxId) -> Option<Vec<u8>> {
			None
		}
		fn prune_to(&self, _max_size: usize) {}
		fn size(&self) -> usize {
			self.txs.lock().unwrap().len()
		}
		fn on_new_tip(&self, _tip_height: u64) {}
	}

	#[test]
	fn accepting_clears_wanted_entry() {
		let pool = TxPool::new(FakeMempool { txs: StdMutex::new(HashSet::new()) });
		let id = veil_core::Hash::from_vec(b"tx1");
		assert!(pool.on_have(id));
		assert!(pool.accept(b"tx1"));
		assert!(!pool.wanted.lock().contains(&id));
	}

	#[test]
	fn duplicate_accept_is_rejected() {
		let pool = TxPool::new(FakeMempool { txs: StdMutex::new(HashSet::new()) });
		assert!(pool.accept(b"tx1"));
		assert!(!pool.accept(b"tx1"));
	}
}
