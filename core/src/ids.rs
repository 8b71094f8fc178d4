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

//! Block/peer identifiers shared by every component of the Node.

use std::fmt;

use crate::hash::Hash;

/// Identifies a block unambiguously: its height plus its header hash.
/// Identifies a block the same way height-plus-hash always does.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId {
	pub height: u64,
	pub hash: Hash,
}

impl fmt::Debug for BlockId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.hash, self.height)
	}
}

impl fmt::Display for BlockId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// Key of an outstanding request: which block, and whether we want its body
/// (`true`) or just its header (`false`).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TaskKey {
	pub id: BlockId,
	pub is_body: bool,
}

impl TaskKey {
	pub fn new(id: BlockId, is_body: bool) -> Self {
		TaskKey { id, is_body }
	}
}

impl fmt::Display for TaskKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} [{}]",
			self.id,
			if self.is_body { "body" } else { "header" }
		)
	}
}

/// A node's long-lived cryptographic identity, used to key `PeerInfo` records
/// and to authenticate the channel handshake. Derived on first run from
/// `("myid", wall-clock)` mixed with the wallet key; here it is an opaque
/// 32-byte value, the derivation itself lives with the wallet (out of scope).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct PeerId(pub [u8; 32]);

impl fmt::Debug for PeerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for b in self.0[..6].iter() {
			write!(f, "{:02x}", b)?;
		}
		Ok(())
	}
}

impl fmt::Display for PeerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// Transaction identifier, produced by the same hash function as blocks.
pub type TxId = Hash;

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn task_key_distinguishes_header_and_body() {
		let id = BlockId {
			height: 10,
			hash: Hash::from_vec(&[1; 32]),
		};
		let h = TaskKey::new(id, false);
		let b = TaskKey::new(id, true);
		assert_ne!(h, b);
	}
}
