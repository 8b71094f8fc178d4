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

//! In-memory `NodeProcessor`/`NodeDB`/`Mempool` fakes, exercising the rest
//! of the workspace against small synthetic state rather than a real
//! chain. Used by integration tests across the workspace, and as the
//! placeholder backend the binary runs against until a real validation
//! engine and database are wired in.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use veil_core::{BlockId, DataStatus, HeaderDesc, MiningCandidate, NodeDB, NodeProcessor, PeerId, TxId};
use veil_pool::Mempool;

pub struct FakeProcessor {
	pub tip: Mutex<u64>,
	pub wanted_heights: Mutex<Vec<u64>>,
	pub accepted: Mutex<HashSet<BlockId>>,
}

impl FakeProcessor {
	pub fn new() -> FakeProcessor {
		FakeProcessor {
			tip: Mutex::new(0),
			wanted_heights: Mutex::new(Vec::new()),
			accepted: Mutex::new(HashSet::new()),
		}
	}
}

impl NodeProcessor for FakeProcessor {
	fn enum_congestions(&self, request: &mut dyn FnMut(BlockId, bool, Option<PeerId>)) {
		let tip = *self.tip.lock().unwrap();
		for h in self.wanted_heights.lock().unwrap().iter() {
			if *h > tip {
				request(
					BlockId { height: *h, hash: veil_core::Hash::from_vec(&h.to_be_bytes()) },
					false,
					None,
				);
			}
		}
	}

	fn on_state(&self, header: HeaderDesc, _from: PeerId) -> DataStatus {
		if header.id.height <= *self.tip.lock().unwrap() {
			return DataStatus::Rejected;
		}
		self.accepted.lock().unwrap().insert(header.id);
		*self.tip.lock().unwrap() = header.id.height;
		DataStatus::Accepted
	}

	fn on_block(&self, id: BlockId, _body: Vec<u8>, _from: PeerId) -> DataStatus {
		if self.accepted.lock().unwrap().contains(&id) {
			DataStatus::Accepted
		} else {
			DataStatus::Rejected
		}
	}

	fn validate_shard(&self, id: BlockId, _body: &[u8], _shard: usize, _shard_count: usize) -> bool {
		self.accepted.lock().unwrap().contains(&id)
	}

	fn finish_block(&self, id: BlockId, body: Vec<u8>, from: PeerId, all_valid: bool) -> DataStatus {
		if !all_valid {
			return DataStatus::Rejected;
		}
		self.on_block(id, body, from)
	}

	fn build_candidate(&self, _miner: PeerId) -> Option<MiningCandidate> {
		let tip = *self.tip.lock().unwrap();
		let id = BlockId { height: tip + 1, hash: veil_core::Hash::from_vec(&(tip + 1).to_be_bytes()) };
		Some(MiningCandidate {
			header: HeaderDesc { id, previous: veil_core::Hash::from_vec(&tip.to_be_bytes()), bytes: vec![0u8; 8] },
			body: Vec::new(),
			fees: 0,
			difficulty: 1,
		})
	}

	fn on_mined_header(&self, header: HeaderDesc) -> DataStatus {
		self.on_state(header, PeerId::default())
	}

	fn on_mined_body(&self, id: BlockId, body: Vec<u8>) -> DataStatus {
		self.on_block(id, body, PeerId::default())
	}

	fn tip_height(&self) -> u64 {
		*self.tip.lock().unwrap()
	}
}

pub struct FakeDb {
	pub id: PeerId,
	pub headers: Mutex<HashMap<BlockId, HeaderDesc>>,
	pub bodies: Mutex<HashMap<BlockId, Vec<u8>>>,
	pub macroblocks: Mutex<Vec<u64>>,
}

impl FakeDb {
	pub fn new(id: PeerId) -> FakeDb {
		FakeDb { id, headers: Mutex::new(HashMap::new()), bodies: Mutex::new(HashMap::new()), macroblocks: Mutex::new(Vec::new()) }
	}
}

impl NodeDB for FakeDb {
	fn my_id(&self) -> PeerId {
		self.id
	}

	fn get_header(&self, id: &BlockId) -> Option<HeaderDesc> {
		self.headers.lock().unwrap().get(id).cloned()
	}

	fn get_body(&self, id: &BlockId) -> Option<Vec<u8>> {
		self.bodies.lock().unwrap().get(id).cloned()
	}

	fn mined_insert(&self, _row: u64, _height: u64, _fees: u64) {}

	fn export_range(&self, _from: u64, _to: u64) -> Result<Vec<Vec<u8>>, String> {
		Ok(vec![vec![0u8]])
	}

	fn macroblock_insert(&self, height: u64) {
		self.macroblocks.lock().unwrap().push(height);
	}

	fn has_macroblock(&self, height: u64) -> bool {
		self.macroblocks.lock().unwrap().contains(&height)
	}

	fn last_macroblock_height(&self) -> Option<u64> {
		self.macroblocks.lock().unwrap().last().copied()
	}
}

pub struct FakeMempool {
	pub txs: Mutex<HashSet<TxId>>,
}

impl FakeMempool {
	pub fn new() -> FakeMempool {
		FakeMempool { txs: Mutex::new(HashSet::new()) }
	}
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
