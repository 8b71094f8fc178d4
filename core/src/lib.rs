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

//! Shared identifiers and external-collaborator interfaces for the node.
//! Deliberately thin: consensus arithmetic, the contract VM, the wallet and
//! the on-disk schema all live outside this workspace and are reached only
//! through the [`processor`] traits.

#[macro_use]
extern crate bitflags;
extern crate serde;
#[macro_use]
extern crate serde_derive;

pub mod capabilities;
pub mod config;
pub mod hash;
pub mod ids;
pub mod processor;
pub mod stop;

pub use crate::capabilities::Capabilities;
pub use crate::config::{CompressorConfig, Timeouts};
pub use crate::hash::{Hash, Hashed};
pub use crate::ids::{BlockId, PeerId, TaskKey, TxId};
pub use crate::processor::{DataStatus, HeaderDesc, MiningCandidate, NodeDB, NodeProcessor};
pub use crate::stop::StopFlag;
