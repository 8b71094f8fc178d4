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

//! Sync/task scheduler, verifier pool, miner, compressor and the `Node`
//! facade that wires them all to `veil_p2p` and `veil_pool`.

extern crate log;
#[macro_use]
extern crate serde_derive;
extern crate chrono;
extern crate parking_lot;
extern crate rand;
extern crate serde;
extern crate serde_json;

extern crate veil_core;
extern crate veil_p2p;
extern crate veil_pool;
extern crate veil_util;

pub mod compressor;
pub mod config;
pub mod miner;
pub mod node;
pub mod scheduler;
pub mod test_support;
pub mod verifier;

pub use crate::compressor::Compressor;
pub use crate::config::{MiningConfig, ServerConfig, VerifierConfig};
pub use crate::miner::Miner;
pub use crate::node::Node;
pub use crate::scheduler::Scheduler;
pub use crate::verifier::VerifierPool;
