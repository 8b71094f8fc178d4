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

//! `NodeProcessor` and `NodeDB` are the two external collaborators named in
//! the workspace: the block/transaction validation arithmetic and the
//! on-disk database layout are explicitly out of scope. Everything the Node
//! needs from them is captured here as a pair of traits; the rest of the
//! workspace depends only on these interfaces, never on a concrete chain or
//! storage implementation.

use crate::hash::Hash;
use crate::ids::{BlockId, PeerId};

/// Outcome of handing a header or a block body to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStatus {
	/// Validated and extends/updates our state; callers should re-run
	/// `RefreshCongestions` to see what height to ask for next.
	Accepted,
	/// Syntactically fine but not currently useful (stale, duplicate,
	/// orphaned beyond our horizon). Not a protocol violation.
	Rejected,
	/// Failed validation. A protocol violation: the caller disconnects and
	/// bans the peer that supplied it.
	Invalid,
}

/// A serialized header together with the identity of the block it describes.
#[derive(Debug, Clone)]
pub struct HeaderDesc {
	pub id: BlockId,
	pub previous: Hash,
	pub bytes: Vec<u8>,
}

/// A freshly assembled mining candidate, as returned by
/// `NodeProcessor::build_candidate`.
#[derive(Debug, Clone)]
pub struct MiningCandidate {
	pub header: HeaderDesc,
	pub body: Vec<u8>,
	pub fees: u64,
	pub difficulty: u64,
}

/// The block/transaction validation engine. Implemented elsewhere (the
/// contract VM, UTXO/kernel set, consensus rules); the Node only ever calls
/// these methods or receives these callbacks.
pub trait NodeProcessor: Send + Sync {
	/// Re-enumerate everything we currently need. For every height/body the
	/// processor still wants, it calls `request(id, is_body, preferred_peer)`
	/// synchronously before returning. Used by `RefreshCongestions` to
	/// garbage-collect requests left over from a reorg.
	fn enum_congestions(&self, request: &mut dyn FnMut(BlockId, bool, Option<PeerId>));

	/// A header arrived, either pushed (`NewTip`) or requested (`Hdr`).
	fn on_state(&self, header: HeaderDesc, from: PeerId) -> DataStatus;

	/// A block body arrived in response to a `GetBody` request.
	fn on_block(&self, id: BlockId, body: Vec<u8>, from: PeerId) -> DataStatus;

	/// Validate shard `shard` of `shard_count` independent, equal slices of
	/// `body`'s transaction set. Called once per shard, from whichever
	/// verifier worker was handed that shard; must not assume it runs on
	/// the reactor thread or alongside any other shard of the same call.
	fn validate_shard(&self, id: BlockId, body: &[u8], shard: usize, shard_count: usize) -> bool;

	/// Commit (or reject) a block once every shard from `validate_shard` has
	/// reported back; `all_valid` is the AND of every shard's result. Called
	/// exactly once per `on_block`, from the reactor thread.
	fn finish_block(&self, id: BlockId, body: Vec<u8>, from: PeerId, all_valid: bool) -> DataStatus;

	/// Assemble a new mining candidate on top of the current tip.
	fn build_candidate(&self, miner: PeerId) -> Option<MiningCandidate>;

	/// Feed a self-mined header back in; must be followed by `on_mined_body`.
	fn on_mined_header(&self, header: HeaderDesc) -> DataStatus;

	/// Feed the matching self-mined body back in.
	fn on_mined_body(&self, id: BlockId, body: Vec<u8>) -> DataStatus;

	/// Current tip height, used only for logging/stats.
	fn tip_height(&self) -> u64;
}

/// The on-disk database. Implemented elsewhere (LMDB/rocksdb-backed chain
/// store); the Node only ever calls these methods.
pub trait NodeDB: Send + Sync {
	/// This node's long-lived identity, generated on first run.
	fn my_id(&self) -> PeerId;

	/// Look up a stored header by id, for answering `GetHdr`.
	fn get_header(&self, id: &BlockId) -> Option<HeaderDesc>;

	/// Look up a stored block body by id, for answering `GetBody`.
	fn get_body(&self, id: &BlockId) -> Option<Vec<u8>>;

	/// Record a mined block's row (keyed by `(row, height)`) with its fees.
	fn mined_insert(&self, row: u64, height: u64, fees: u64);

	/// Export the data streams covering `[from, to]` for macroblock
	/// aggregation. Performed under the DB-writer's exclusive access, which
	/// is why the compressor worker requests it via the main reactor instead
	/// of calling this directly.
	fn export_range(&self, from: u64, to: u64) -> Result<Vec<Vec<u8>>, String>;

	/// Record a completed macroblock's upper height.
	fn macroblock_insert(&self, height: u64);

	/// Whether we have already recorded a macroblock at this height.
	fn has_macroblock(&self, height: u64) -> bool;

	/// The height of the most recent macroblock, if any.
	fn last_macroblock_height(&self) -> Option<u64>;
}
