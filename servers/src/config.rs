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

//! `ServerConfig` aggregates every sub-component's configuration into one
//! struct the binary loads from disk.

use veil_core::{CompressorConfig, Timeouts};
use veil_p2p::P2PConfig;
use veil_util::LoggingConfig;

/// Number of mining worker threads, if mining is enabled at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MiningConfig {
	pub enabled: bool,
	pub worker_threads: usize,
}

impl Default for MiningConfig {
	fn default() -> MiningConfig {
		MiningConfig { enabled: false, worker_threads: 1 }
	}
}

/// Number of worker threads in the verification pool, and how many
/// submitted-but-not-yet-run jobs may queue before `submit` blocks the
/// caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerifierConfig {
	pub worker_threads: usize,
	pub queue_capacity: usize,
}

impl Default for VerifierConfig {
	fn default() -> VerifierConfig {
		VerifierConfig { worker_threads: 4, queue_capacity: 64 }
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
	pub p2p_config: P2PConfig,
	pub timeouts: Timeouts,
	pub compressor_config: CompressorConfig,
	pub mining_config: MiningConfig,
	pub verifier_config: VerifierConfig,
	pub logging: Option<LoggingConfig>,
	/// Where on disk the node's long-lived identity and database live.
	pub db_root: String,
}

impl Default for ServerConfig {
	fn default() -> ServerConfig {
		ServerConfig {
			p2p_config: P2PConfig::default(),
			timeouts: Timeouts::default(),
			compressor_config: CompressorConfig::default(),
			mining_config: MiningConfig::default(),
			verifier_config: VerifierConfig::default(),
			logging: Some(LoggingConfig::default()),
			db_root: ".veil".to_string(),
		}
	}
}
