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

//! Capability flags exchanged in the `Config` handshake message.

bitflags! {
	/// What a peer advertises it supports, negotiated once per connection via
	/// the `Config` message and re-evaluated on flag transitions.
	#[derive(Default, Serialize, Deserialize)]
	pub struct Capabilities: u32 {
		/// We don't know (yet) what the peer can do.
		const UNKNOWN = 0b0000;
		/// Peer relays and accepts mempool transactions.
		const SPREADING_TX = 0b0001;
		/// Peer is willing to mine.
		const MINING = 0b0010;
		/// Peer automatically pushes `NewTip`/`Hdr` without being asked.
		const AUTO_SEND_HEADER = 0b0100;
		/// Peer will answer peer-address requests.
		const SEND_PEERS = 0b1000;

		const FULL_NODE = Self::SPREADING_TX.bits | Self::AUTO_SEND_HEADER.bits | Self::SEND_PEERS.bits;
	}
}
