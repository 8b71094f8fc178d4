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

use std::convert::From;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use veil_core::{BlockId, Capabilities, Hashed, PeerId};

/// Errors bubbling up out of the p2p layer. Protocol-violation callers
/// convert these into a disconnect+ban; transient-IO callers disconnect
/// without banning.
#[derive(Debug)]
pub enum Error {
	/// The remote peer broke a message-level invariant (wrong task kind,
	/// stale tip, duplicate identity, bad checksum, unauthorized request).
	ProtocolViolation(String),
	/// The send failed because the connection is gone.
	ConnectionClosed,
	/// We never heard back in time.
	Timeout,
	/// Tried to act on a peer we don't know, or double-registered one.
	UnknownPeer,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::ProtocolViolation(s) => write!(f, "protocol violation: {}", s),
			Error::ConnectionClosed => write!(f, "connection closed"),
			Error::Timeout => write!(f, "timed out"),
			Error::UnknownPeer => write!(f, "unknown peer"),
		}
	}
}

impl std::error::Error for Error {}

/// Configuration for the peer-to-peer server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2PConfig {
	pub host: IpAddr,
	pub port: u16,
	/// Desired number of outbound connections maintained by `PeerManager::update`.
	pub peer_fan_out: usize,
	/// Names which network/ruleset this node runs. Hashed into the
	/// handshake's `Config.checksum` and the beacon datagram's leading
	/// bytes, so a node on a different network fails both cheaply instead
	/// of half-handshaking or polluting discovery.
	pub network_id: String,
}

impl P2PConfig {
	pub fn cfg_checksum(&self) -> [u8; 32] {
		self.network_id.as_bytes().hash().0
	}
}

impl Default for P2PConfig {
	fn default() -> P2PConfig {
		P2PConfig {
			host: "0.0.0.0".parse().unwrap(),
			port: 17_235,
			peer_fan_out: 8,
			network_id: "veil-mainnet".to_string(),
		}
	}
}

/// A block header description as carried by `NewTip`/`Hdr`.
#[derive(Debug, Clone)]
pub struct HdrMsg {
	pub id: BlockId,
	pub previous: veil_core::Hash,
	pub bytes: Vec<u8>,
}

/// Tagged variant of every wire message the Node protocol names. Expressed
/// as an enum with one handler arm per tag on `Peer`, rather than virtual
/// dispatch, to keep the state machine inspectable in tests.
#[derive(Debug, Clone)]
pub enum Msg {
	/// Authenticated-channel handshake; must precede anything else.
	SChannelAuthentication { nonce: [u8; 32] },
	/// Advertise capability flags.
	Config { capabilities: Capabilities, checksum: [u8; 32] },
	/// Advertise our own identity and listen port.
	PeerInfoSelf { id: PeerId, listen_port: u16 },
	Ping,
	Pong,
	NewTip { id: BlockId },
	GetHdr { id: BlockId },
	Hdr { desc: HdrMsg },
	GetBody { id: BlockId },
	Body { id: BlockId, bytes: Vec<u8> },
	DataMissing { id: BlockId, is_body: bool },
	NewTransaction { id: veil_core::TxId, bytes: Vec<u8> },
	Boolean { value: bool },
	HaveTransaction { id: veil_core::TxId },
	GetTransaction { id: veil_core::TxId },
	GetMined { height_from: u64 },
	Mined { rows: Vec<(u64, u64, u64)> },
	GetProofState { height: u64 },
	GetProofKernel { id: veil_core::TxId },
	GetProofUtxo { commitment: Vec<u8> },
	Proof { bytes: Vec<u8> },
	ProofUtxo { bytes: Vec<u8> },
}

/// Where a connection sends its outgoing messages. The wire encoding itself
/// is out of scope; implementors serialize `Msg` onto
/// a socket however they see fit.
pub trait Transport: Send + Sync {
	fn send(&self, msg: Msg) -> Result<(), Error>;
	fn remote_addr(&self) -> SocketAddr;
	fn close(&self);
}
