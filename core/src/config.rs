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

//! Timeouts shared by the peer session, the tx relay and the miner. Kept in
//! `veil_core` (rather than duplicated in `veil_p2p` and `veil_servers`)
//! since both crates need them and neither depends on the other.

/// All of the Node's timing knobs, gathered in one place instead of
/// scattered literals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timeouts {
	/// How long we wait for a `Body` response before timing out the peer.
	pub get_block_ms: u32,
	/// How long we wait for a `Hdr` response before timing out the peer.
	pub get_state_ms: u32,
	/// How long we wait after the first `HaveTransaction` advertisement
	/// before broadcasting `GetTransaction` to every spreading peer.
	pub get_tx_ms: u32,
	/// Debounce window for a soft mining restart.
	pub mining_soft_restart_ms: u32,
	/// Debounce window for a hard mining restart (overrides a pending soft one).
	pub mining_hard_restart_ms: u32,
	/// Period between LAN beacon broadcasts.
	pub beacon_period_ms: u32,
}

impl Default for Timeouts {
	fn default() -> Timeouts {
		Timeouts {
			get_block_ms: 5_000,
			get_state_ms: 5_000,
			get_tx_ms: 10_000,
			mining_soft_restart_ms: 250,
			mining_hard_restart_ms: 0,
			beacon_period_ms: 1_000,
		}
	}
}

/// Compression (macroblock aggregation) tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompressorConfig {
	/// Heights older than `tip - threshold` become eligible for aggregation.
	pub threshold: u64,
	/// Minimum contiguous range before a job is spawned.
	pub min_aggregate: u64,
	/// Chunk size requested from the main thread at a time.
	pub naggling: u64,
	/// How many trailing non-aggregated blocks to retain on disk.
	pub max_backlog: u64,
}

impl Default for CompressorConfig {
	fn default() -> CompressorConfig {
		CompressorConfig {
			threshold: 1_440,
			min_aggregate: 720,
			naggling: 64,
			max_backlog: 1_440,
		}
	}
}
