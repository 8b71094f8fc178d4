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

//! Peer session, peer manager and LAN beacon.

extern crate net2;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate chrono;
#[macro_use]
extern crate log;

extern crate veil_core;
extern crate veil_util;

pub mod adapter;
pub mod beacon;
pub mod peer;
pub mod peers;
pub mod types;

pub use crate::adapter::NodeAdapter;
pub use crate::beacon::{Announcement, Beacon};
pub use crate::peer::{Peer, PeerState};
pub use crate::peers::{PeerInfo, PeerManager};
pub use crate::types::{Error, HdrMsg, Msg, P2PConfig, Transport};
