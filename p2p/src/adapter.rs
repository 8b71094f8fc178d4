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

//! Bridge between a `Peer` session and the rest of the Node (the task
//! scheduler, the tx pool, the miner). `Peer` never reaches into the
//! scheduler or pool directly, it only calls back through this trait,
//! which `veil_servers::Node` implements.

use std::net::SocketAddr;

use veil_core::{BlockId, DataStatus, HeaderDesc, PeerId, TxId};

/// Everything a `Peer` session needs from the rest of the Node.
pub trait NodeAdapter: Send + Sync {
	/// Request a header or body, optionally preferring `from` as the peer to
	/// ask first (used when a `NewTip` names the peer that is obviously
	/// ahead).
	fn request_data(&self, id: BlockId, is_body: bool, preferred: Option<PeerId>);

	/// Re-run `RefreshCongestions` (called after a task completes with
	/// `Accepted`, so the processor can ask for the next height).
	fn refresh_congestions(&self);

	/// A header arrived from `from`.
	fn on_header(&self, header: HeaderDesc, from: PeerId) -> DataStatus;

	/// A block body arrived from `from`.
	fn on_block(&self, id: BlockId, body: Vec<u8>, from: PeerId) -> DataStatus;

	/// Move `id`'s key into the peer's rejected set and try to reassign it
	/// elsewhere (a `DataMissing` response).
	fn on_data_missing(&self, addr: SocketAddr, id: BlockId, is_body: bool);

	/// Reward/penalize the identity's reputation.
	fn reward_header(&self, id: PeerId);
	fn reward_block(&self, id: PeerId);
	fn penalty_timeout(&self, id: PeerId);
	fn ban(&self, id: PeerId);

	/// A transaction arrived; returns whether it was newly accepted into the
	/// pool (drives the `Boolean` reply and the `HaveTransaction` fan-out).
	fn on_new_transaction(&self, from: SocketAddr, bytes: Vec<u8>) -> bool;

	/// A peer advertised a transaction id we don't have; start a `WantedTx`
	/// timer and request it, preferentially from `from`.
	fn on_have_transaction(&self, from: SocketAddr, id: TxId);

	/// A peer asked for a transaction by id; look it up in the pool.
	fn get_transaction(&self, id: TxId) -> Option<Vec<u8>>;

	/// `GetMined` query, access-controlled by `RestrictMinedReportToOwner`.
	fn get_mined(&self, requester: PeerId, height_from: u64) -> Result<Vec<(u64, u64, u64)>, ()>;

	/// Our own identity, used to accept/refuse `GetMined`.
	fn my_id(&self) -> PeerId;

	/// A peer's tip advanced and its `rejected` set was just cleared; walk the
	/// unassigned task queue and try to (re)assign work to it, preferring it
	/// over peers that already declined those tasks.
	fn take_tasks(&self, preferred: PeerId);
}
