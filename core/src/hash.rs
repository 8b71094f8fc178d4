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

//! The hash used pervasively to identify blocks, headers and transactions.

use std::fmt;

use blake2_rfc::blake2b::blake2b;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 32-byte identifier for a block, header or transaction.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub [u8; 32]);

pub const ZERO_HASH: Hash = Hash([0; 32]);

impl Hash {
	/// Builds a Hash from a byte slice, zero-padding or truncating as needed.
	/// Only used by tests and fixtures; real hashes always come from `Hashed`.
	pub fn from_vec(v: &[u8]) -> Hash {
		let mut a = [0u8; 32];
		let n = v.len().min(32);
		a[..n].copy_from_slice(&v[..n]);
		Hash(a)
	}

	pub fn to_vec(&self) -> Vec<u8> {
		self.0.to_vec()
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for b in self.0[..6].iter() {
			write!(f, "{:02x}", b)?;
		}
		Ok(())
	}
}

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self)
	}
}

impl Serialize for Hash {
	fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_bytes(&self.0)
	}
}

impl<'de> Deserialize<'de> for Hash {
	fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
		let v: Vec<u8> = Deserialize::deserialize(d)?;
		Ok(Hash::from_vec(&v))
	}
}

/// A type that can produce its own content hash.
pub trait Hashed {
	fn hash(&self) -> Hash;
}

impl Hashed for [u8] {
	fn hash(&self) -> Hash {
		let digest = blake2b(32, &[], self);
		Hash::from_vec(digest.as_bytes())
	}
}

impl Hashed for Vec<u8> {
	fn hash(&self) -> Hash {
		self.as_slice().hash()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn hash_of_same_bytes_is_stable() {
		let a = b"block-body".hash();
		let b = b"block-body".hash();
		assert_eq!(a, b);
	}

	#[test]
	fn hash_display_is_hex_prefix() {
		let h = Hash::from_vec(&[0xab; 32]);
		assert_eq!(format!("{}", h), "abababababab");
	}
}
