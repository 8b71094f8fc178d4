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

//! A single peer connection's session state machine, and the handler for
//! every message tag named in the protocol.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use veil_core::{BlockId, Capabilities, PeerId, TaskKey, Timeouts};

use crate::adapter::NodeAdapter;
use crate::types::{Error, Msg, Transport};

/// How long we'll wait for the authentication/handshake sequence before
/// giving up on a connection.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
	/// TCP connected, nothing exchanged yet.
	Connecting,
	/// `SChannelAuthentication` sent, waiting for `Config`+`PeerInfoSelf`.
	HandshakeWait,
	/// Fully up, free to carry tasks and relay transactions.
	Live,
	/// Torn down; kept around only until the owner drops the last reference.
	Closed,
}

/// A connected peer and everything the task scheduler, the tx pool and the
/// peer manager need to know about it.
pub struct Peer {
	pub remote_addr: SocketAddr,
	pub listen_port: Option<u16>,
	pub identity: Option<PeerId>,
	pub capabilities: Capabilities,
	pub state: PeerState,
	pub tip_height: u64,

	/// Tasks currently assigned to this peer, in request order. The first
	/// entry drives `timer_deadline`.
	pub tasks: Vec<TaskKey>,
	/// Tasks this peer has already answered `DataMissing` for; never
	/// reassigned to it again for the lifetime of the connection.
	pub rejected: HashSet<TaskKey>,
	pub timer_deadline: Option<Instant>,

	timeouts: Timeouts,
	cfg_checksum: [u8; 32],
	transport: Arc<dyn Transport>,
	adapter: Arc<dyn NodeAdapter>,
}

impl Peer {
	pub fn new(transport: Arc<dyn Transport>, adapter: Arc<dyn NodeAdapter>) -> Peer {
		Peer::with_timeouts(transport, adapter, Timeouts::default())
	}

	pub fn with_timeouts(transport: Arc<dyn Transport>, adapter: Arc<dyn NodeAdapter>, timeouts: Timeouts) -> Peer {
		Peer::with_config(transport, adapter, timeouts, [0u8; 32])
	}

	pub fn with_config(transport: Arc<dyn Transport>, adapter: Arc<dyn NodeAdapter>, timeouts: Timeouts, cfg_checksum: [u8; 32]) -> Peer {
		let remote_addr = transport.remote_addr();
		Peer {
			remote_addr,
			listen_port: None,
			identity: None,
			capabilities: Capabilities::UNKNOWN,
			state: PeerState::Connecting,
			tip_height: 0,
			tasks: Vec::new(),
			rejected: HashSet::new(),
			timer_deadline: None,
			timeouts,
			cfg_checksum,
			transport,
			adapter,
		}
	}

	/// Timeout for the task at the head of the queue: `get_state_ms` for a
	/// header task, `get_block_ms` for a body task.
	fn timeout_for(&self, task: TaskKey) -> Duration {
		if task.is_body {
			Duration::from_millis(self.timeouts.get_block_ms as u64)
		} else {
			Duration::from_millis(self.timeouts.get_state_ms as u64)
		}
	}

	pub fn is_live(&self) -> bool {
		self.state == PeerState::Live
	}

	/// Begin the handshake: authenticate, then advertise our capabilities
	/// and identity.
	pub fn start_handshake(&mut self, nonce: [u8; 32], my_capabilities: Capabilities, my_id: PeerId, my_port: u16) {
		self.state = PeerState::HandshakeWait;
		let _ = self.transport.send(Msg::SChannelAuthentication { nonce });
		let _ = self.transport.send(Msg::Config {
			capabilities: my_capabilities,
			checksum: self.cfg_checksum,
		});
		let _ = self.transport.send(Msg::PeerInfoSelf {
			id: my_id,
			listen_port: my_port,
		});
	}

	/// True if `task` is eligible for assignment to this peer: live, not
	/// already carrying it, hasn't rejected it before, and — for a body
	/// task — not already carrying a different body task (at most one body
	/// task in flight per peer at a time).
	pub fn can_carry(&self, task: TaskKey) -> bool {
		if !self.is_live() || self.tasks.contains(&task) || self.rejected.contains(&task) {
			return false;
		}
		if task.is_body && self.tasks.iter().any(|t| t.is_body) {
			return false;
		}
		true
	}

	/// Assign `task` to this peer and (re)arm its timer if it is now the
	/// head of the queue.
	pub fn assign(&mut self, task: TaskKey) {
		let was_empty = self.tasks.is_empty();
		let timeout = self.timeout_for(task);
		self.tasks.push(task);
		if was_empty {
			self.timer_deadline = Some(Instant::now() + timeout);
		}
	}

	/// Remove `task` from this peer's queue, returning whether it was the
	/// head (the caller re-arms the timer for the new head, if any).
	pub fn unassign(&mut self, task: TaskKey) -> bool {
		if let Some(pos) = self.tasks.iter().position(|t| *t == task) {
			let was_head = pos == 0;
			self.tasks.remove(pos);
			was_head
		} else {
			false
		}
	}

	/// Re-arm the timer for whatever is now at the head of the queue (or
	/// disarm it if the queue emptied out).
	pub fn rearm_timer(&mut self) {
		self.timer_deadline = match self.tasks.first() {
			Some(&task) => Some(Instant::now() + self.timeout_for(task)),
			None => None,
		};
	}

	/// True if this peer is carrying at least one task and its timer has
	/// expired as of `now`. Used by the reactor's timeout sweep.
	pub fn timed_out(&self, now: Instant) -> bool {
		matches!(self.timer_deadline, Some(deadline) if now >= deadline)
	}

	/// Dispatch an inbound message. One arm per tag: a tagged enum plus a
	/// match keeps the state machine inspectable in tests, as opposed to
	/// virtual dispatch per message type.
	pub fn handle(&mut self, msg: Msg) -> Result<(), Error> {
		match msg {
			Msg::SChannelAuthentication { .. } => {
				// Responder side: nothing further to do until Config/PeerInfoSelf.
				Ok(())
			}
			Msg::Config { capabilities, checksum } => {
				if checksum != self.cfg_checksum {
					return Err(Error::ProtocolViolation("config checksum mismatch".into()));
				}
				self.capabilities = capabilities;
				Ok(())
			}
			Msg::PeerInfoSelf { id, listen_port } => {
				if id == self.adapter.my_id() {
					return Err(Error::ProtocolViolation("self-connect".into()));
				}
				if self.identity.is_some() {
					return Err(Error::ProtocolViolation("PeerInfoSelf sent twice".into()));
				}
				self.identity = Some(id);
				self.listen_port = Some(listen_port);
				self.state = PeerState::Live;
				info!("peer {} identified as {:?}", self.remote_addr, id);
				Ok(())
			}
			Msg::Ping => self.transport.send(Msg::Pong),
			Msg::Pong => Ok(()),
			Msg::NewTip { id } => {
				if id.height < self.tip_height {
					return Err(Error::ProtocolViolation("NewTip height decreased".into()));
				}
				self.tip_height = id.height;
				self.rejected.clear();
				if let Some(identity) = self.identity {
					self.adapter.take_tasks(identity);
				}
				let preferred = self.identity;
				self.adapter.request_data(id, false, preferred);
				Ok(())
			}
			Msg::GetHdr { .. } | Msg::GetBody { .. } => {
				// Answered by the owner (Node) which holds the DB handle;
				// the session layer only routes the reply back out.
				Ok(())
			}
			Msg::Hdr { desc } => {
				let from = self.require_identity()?;
				let id = desc.id;
				let status = self.adapter.on_header(
					veil_core::HeaderDesc {
						id: desc.id,
						previous: desc.previous,
						bytes: desc.bytes,
					},
					from,
				);
				self.on_task_result(TaskKey::new(id, false), status)
			}
			Msg::Body { id, bytes } => {
				let from = self.require_identity()?;
				let status = self.adapter.on_block(id, bytes, from);
				self.on_task_result(TaskKey::new(id, true), status)
			}
			Msg::DataMissing { id, is_body } => {
				self.rejected.insert(TaskKey::new(id, is_body));
				self.unassign(TaskKey::new(id, is_body));
				self.adapter.on_data_missing(self.remote_addr, id, is_body);
				Ok(())
			}
			Msg::NewTransaction { bytes, .. } => {
				let accepted = self.adapter.on_new_transaction(self.remote_addr, bytes);
				self.transport.send(Msg::Boolean { value: accepted })
			}
			Msg::Boolean { .. } => Ok(()),
			Msg::HaveTransaction { id } => {
				self.adapter.on_have_transaction(self.remote_addr, id);
				Ok(())
			}
			Msg::GetTransaction { id } => {
				if let Some(bytes) = self.adapter.get_transaction(id) {
					self.transport.send(Msg::NewTransaction { id, bytes })
				} else {
					Ok(())
				}
			}
			Msg::GetMined { height_from } => {
				let from = self.require_identity()?;
				match self.adapter.get_mined(from, height_from) {
					Ok(rows) => self.transport.send(Msg::Mined { rows }),
					Err(()) => {
						warn!("peer {} not authorized for GetMined", self.remote_addr);
						Ok(())
					}
				}
			}
			Msg::Mined { .. } => Ok(()),
			Msg::GetProofState { .. } | Msg::GetProofKernel { .. } | Msg::GetProofUtxo { .. } => {
				// Resolved to the proof bytes by the owner (NodeDB-backed);
				// the session layer only carries the reply.
				Ok(())
			}
			Msg::Proof { .. } | Msg::ProofUtxo { .. } => Ok(()),
		}
	}

	fn require_identity(&self) -> Result<PeerId, Error> {
		self.identity.ok_or_else(|| Error::ProtocolViolation("message before PeerInfoSelf".into()))
	}

	/// Shared tail of `Hdr`/`Body` handling: reward or penalize, clear the
	/// task off this peer, and on success ask the processor what's next.
	fn on_task_result(&mut self, task: TaskKey, status: veil_core::DataStatus) -> Result<(), Error> {
		use veil_core::DataStatus::*;
		let id = self.identity;
		self.unassign(task);
		self.rearm_timer();
		match status {
			Accepted => {
				if let Some(id) = id {
					self.adapter.reward_header(id);
				}
				self.adapter.refresh_congestions();
				Ok(())
			}
			Rejected => Ok(()),
			Invalid => {
				if let Some(id) = id {
					self.adapter.ban(id);
				}
				Err(Error::ProtocolViolation("invalid data".into()))
			}
		}
	}

	pub fn send(&self, msg: Msg) -> Result<(), Error> {
		self.transport.send(msg)
	}

	pub fn close(&mut self) {
		self.state = PeerState::Closed;
		self.transport.close();
	}
}

impl std::fmt::Debug for Peer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Peer")
			.field("remote_addr", &self.remote_addr)
			.field("identity", &self.identity)
			.field("state", &self.state)
			.field("tasks", &self.tasks.len())
			.finish()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::Mutex;

	struct NullTransport(SocketAddr, Mutex<Vec<Msg>>);
	impl Transport for NullTransport {
		fn send(&self, msg: Msg) -> Result<(), Error> {
			self.1.lock().unwrap().push(msg);
			Ok(())
		}
		fn remote_addr(&self) -> SocketAddr {
			self.0
		}
		fn close(&self) {}
	}

	struct NullAdapter(PeerId);
	impl NodeAdapter for NullAdapter {
		fn request_data(&self, _id: BlockId, _is_body: bool, _preferred: Option<PeerId>) {}
		fn refresh_congestions(&self) {}
		fn on_header(&self, _h: veil_core::HeaderDesc, _from: PeerId) -> veil_core::DataStatus {
			veil_core::DataStatus::Accepted
		}
		fn on_block(&self, _id: BlockId, _b: Vec<u8>, _from: PeerId) -> veil_core::DataStatus {
			veil_core::DataStatus::Accepted
		}
		fn on_data_missing(&self, _addr: SocketAddr, _id: BlockId, _is_body: bool) {}
		fn reward_header(&self, _id: PeerId) {}
		fn reward_block(&self, _id: PeerId) {}
		fn penalty_timeout(&self, _id: PeerId) {}
		fn ban(&self, _id: PeerId) {}
		fn on_new_transaction(&self, _from: SocketAddr, _bytes: Vec<u8>) -> bool {
			true
		}
		fn on_have_transaction(&self, _from: SocketAddr, _id: veil_core::TxId) {}
		fn get_transaction(&self, _id: veil_core::TxId) -> Option<Vec<u8>> {
			None
		}
		fn get_mined(&self, _requester: PeerId, _height_from: u64) -> Result<Vec<(u64, u64, u64)>, ()> {
			Ok(vec![])
		}
		fn my_id(&self) -> PeerId {
			self.0
		}
		fn take_tasks(&self, _preferred: PeerId) {}
	}

	fn peer() -> Peer {
		let addr: SocketAddr = "127.0.0.1:10".parse().unwrap();
		let transport = Arc::new(NullTransport(addr, Mutex::new(vec![])));
		let adapter = Arc::new(NullAdapter(PeerId::default()));
		Peer::new(transport, adapter)
	}

	#[test]
	fn self_connect_is_rejected() {
		let mut p = peer();
		let my_id = PeerId::default();
		let result = p.handle(Msg::PeerInfoSelf { id: my_id, listen_port: 1 });
		assert!(result.is_err());
	}

	#[test]
	fn identify_moves_to_live() {
		let mut p = peer();
		let other = PeerId([1u8; 32]);
		p.handle(Msg::PeerInfoSelf { id: other, listen_port: 17235 }).unwrap();
		assert!(p.is_live());
		assert_eq!(p.identity, Some(other));
	}

	#[test]
	fn assign_then_unassign_rearms_timer_only_while_nonempty() {
		let mut p = peer();
		let t = TaskKey::new(BlockId { height: 1, hash: veil_core::Hash::from_vec(b"x") }, false);
		p.assign(t);
		assert!(p.timer_deadline.is_some());
		p.unassign(t);
		p.rearm_timer();
		assert!(p.timer_deadline.is_none());
	}

	#[test]
	fn data_missing_marks_rejected_and_never_reassigned() {
		let mut p = peer();
		let t = TaskKey::new(BlockId { height: 1, hash: veil_core::Hash::from_vec(b"x") }, false);
		p.assign(t);
		p.handle(Msg::DataMissing { id: t.id, is_body: t.is_body }).unwrap();
		assert!(!p.can_carry(t));
	}

	#[test]
	fn second_body_task_cannot_be_carried_while_one_is_in_flight() {
		let mut p = peer();
		p.state = PeerState::Live;
		let a = TaskKey::new(BlockId { height: 1, hash: veil_core::Hash::from_vec(b"a") }, true);
		let b = TaskKey::new(BlockId { height: 2, hash: veil_core::Hash::from_vec(b"b") }, true);
		assert!(p.can_carry(a));
		p.assign(a);
		assert!(!p.can_carry(b));
	}

	#[test]
	fn decreasing_new_tip_is_a_protocol_violation() {
		let mut p = peer();
		p.tip_height = 10;
		let id = BlockId { height: 5, hash: veil_core::Hash::from_vec(b"x") };
		assert!(p.handle(Msg::NewTip { id }).is_err());
	}

	#[test]
	fn timed_out_reports_only_once_deadline_passes() {
		let mut p = peer();
		let t = TaskKey::new(BlockId { height: 1, hash: veil_core::Hash::from_vec(b"x") }, false);
		p.assign(t);
		assert!(!p.timed_out(Instant::now()));
		assert!(p.timed_out(Instant::now() + Duration::from_secs(3600)));
	}
}
