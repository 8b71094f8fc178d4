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

//! Wires the scheduler, the verifier pool, the miner, the compressor, the
//! tx pool and the peer manager into one facade that implements
//! `veil_p2p::NodeAdapter`. Every `Peer` session calls back into this
//! single object; nothing downstream reaches into the others directly,
//! matching a single-reactor ownership model: one owner for sockets,
//! timers, peer state, the scheduler, the pool, the peer manager and the
//! processor/DB handles.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use veil_core::{BlockId, Capabilities, DataStatus, HeaderDesc, NodeDB, NodeProcessor, PeerId, TaskKey, Timeouts, TxId};
use veil_p2p::{Msg, NodeAdapter, Peer, PeerManager, Transport};
use veil_pool::{Mempool, TxPool};

use crate::compressor::Compressor;
use crate::config::ServerConfig;
use crate::miner::Miner;
use crate::scheduler::Scheduler;
use crate::verifier::VerifierPool;

pub struct Node<M: Mempool> {
	processor: Arc<dyn NodeProcessor>,
	db: Arc<dyn NodeDB>,
	pub peers: Arc<PeerManager>,
	pub scheduler: Arc<Scheduler>,
	pub pool: Arc<TxPool<M>>,
	pub miner: Arc<Miner>,
	pub compressor: Arc<Compressor>,
	pub verifier: Arc<VerifierPool>,
	mining_enabled: bool,
	timeouts: Timeouts,
	cfg_checksum: [u8; 32],
}

impl<M: Mempool + 'static> Node<M> {
	pub fn new(processor: Arc<dyn NodeProcessor>, db: Arc<dyn NodeDB>, pool: Arc<TxPool<M>>, config: &ServerConfig) -> Arc<Node<M>> {
		let my_id = db.my_id();
		let miner = Miner::new(processor.clone(), my_id, config.mining_config);
		let compressor = Compressor::new(db.clone(), config.compressor_config);
		let verifier = Arc::new(VerifierPool::new(config.verifier_config.worker_threads, config.verifier_config.queue_capacity));
		Arc::new(Node {
			processor,
			db,
			peers: Arc::new(PeerManager::new(config.p2p_config.peer_fan_out)),
			scheduler: Arc::new(Scheduler::new()),
			pool,
			miner,
			compressor,
			verifier,
			mining_enabled: config.mining_config.enabled,
			timeouts: config.timeouts,
			cfg_checksum: config.p2p_config.cfg_checksum(),
		})
	}

	/// Construct a session object for a freshly accepted or dialed
	/// connection, wired with this `Node` as its adapter, the configured
	/// per-task-kind timeouts and the handshake's config checksum.
	pub fn new_peer(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Peer {
		Peer::with_config(transport, self.clone(), self.timeouts, self.cfg_checksum)
	}

	/// The config checksum beaconed on the LAN and carried in the
	/// handshake's `Config` message.
	pub fn cfg_checksum(&self) -> [u8; 32] {
		self.cfg_checksum
	}

	/// Reactor-driven timeout sweep: any live peer whose `timer_deadline`
	/// has passed is penalized, disconnected and has its in-flight tasks
	/// requeued for another peer to pick up.
	pub fn sweep_peer_timeouts(&self, now: Instant) {
		for peer in self.peers.live_peers() {
			let (timed_out, identity, tasks) = {
				let guard = peer.read();
				(guard.timed_out(now), guard.identity, guard.tasks.clone())
			};
			if !timed_out {
				continue;
			}
			if let Some(identity) = identity {
				warn!("peer {:?} timed out carrying {} task(s)", identity, tasks.len());
				self.peers.penalty_timeout(identity);
				self.peers.clear_live(&identity);
			}
			peer.write().close();
			for task in tasks {
				self.scheduler.requeue(task);
				try_assign(&self.scheduler, &self.peers, task.id, task.is_body, None);
			}
		}
	}

	/// Reactor-driven tick for the pool's solicitation timer: every id that
	/// has gone unanswered past its deadline is rebroadcast as
	/// `GetTransaction` to every live peer that advertises `SPREADING_TX`.
	pub fn fire_wanted_timer(&self, now: Instant) {
		let overdue = self.pool.fire_wanted_timer(now);
		if overdue.is_empty() {
			return;
		}
		let spreaders: Vec<_> = self
			.peers
			.live_peers()
			.into_iter()
			.filter(|p| p.read().capabilities.contains(Capabilities::SPREADING_TX))
			.collect();
		for id in overdue {
			for peer in &spreaders {
				let _ = peer.read().send(Msg::GetTransaction { id });
			}
		}
	}

	/// Re-run `enum_congestions`, dropping any scheduler entry the
	/// processor no longer asks for and requesting every one it still
	/// wants.
	pub fn refresh_congestions_now(&self) {
		let mut wanted = std::collections::HashSet::new();
		let scheduler = self.scheduler.clone();
		let peers = self.peers.clone();
		{
			let mut request = |id: BlockId, is_body: bool, preferred: Option<PeerId>| {
				wanted.insert(TaskKey::new(id, is_body));
				if scheduler.request(id, is_body) {
					try_assign(&scheduler, &peers, id, is_body, preferred);
				}
			};
			self.processor.enum_congestions(&mut request);
		}
		self.scheduler.retain_wanted(&wanted);
	}

	fn finish_task(&self, id: BlockId, status: DataStatus) {
		if status == DataStatus::Accepted {
			self.verifier.bump_generation();
			self.compressor.notify_tip(self.processor.tip_height());
			self.pool.on_new_tip(self.processor.tip_height());
			if self.mining_enabled {
				// A new tip invalidates whatever the miner was grinding on,
				// so this is a hard abort rather than the debounced soft
				// restart `pull_new_candidate` performs for routine updates.
				self.miner.hard_restart();
			}
		}
		let _ = id;
	}
}

impl<M: Mempool + 'static> NodeAdapter for Node<M> {
	fn request_data(&self, id: BlockId, is_body: bool, preferred: Option<PeerId>) {
		if self.scheduler.request(id, is_body) {
			try_assign(&self.scheduler, &self.peers, id, is_body, preferred);
		}
	}

	fn refresh_congestions(&self) {
		self.refresh_congestions_now();
	}

	fn on_header(&self, header: HeaderDesc, from: PeerId) -> DataStatus {
		let id = header.id;
		let status = self.processor.on_state(header, from);
		self.finish_task(id, status);
		status
	}

	fn on_block(&self, id: BlockId, body: Vec<u8>, from: PeerId) -> DataStatus {
		// Validation is sharded across the verifier pool's workers rather
		// than run whole on the reactor thread; the reactor blocks on
		// `submit_block` until every shard has reported back, then commits
		// once via `finish_block`.
		let shard_count = self.verifier.worker_threads();
		let processor = self.processor.clone();
		let body_for_shards = Arc::new(body);
		let body_for_shard_check = body_for_shards.clone();
		let all_valid = self.verifier.submit_block(shard_count, move |shard| {
			processor.validate_shard(id, &body_for_shard_check, shard, shard_count)
		});
		let body = Arc::try_unwrap(body_for_shards).unwrap_or_else(|shared| (*shared).clone());
		let status = self.processor.finish_block(id, body, from, all_valid);
		self.finish_task(id, status);
		status
	}

	fn on_data_missing(&self, addr: SocketAddr, id: BlockId, is_body: bool) {
		warn!("{} reported DataMissing for {}", addr, id);
		let key = TaskKey::new(id, is_body);
		self.scheduler.requeue(key);
		try_assign(&self.scheduler, &self.peers, id, is_body, None);
	}

	fn reward_header(&self, id: PeerId) {
		self.peers.reward_header(id);
	}

	fn reward_block(&self, id: PeerId) {
		self.peers.reward_block(id);
	}

	fn penalty_timeout(&self, id: PeerId) {
		self.peers.penalty_timeout(id);
	}

	fn ban(&self, id: PeerId) {
		self.peers.ban(id);
	}

	fn on_new_transaction(&self, from: SocketAddr, bytes: Vec<u8>) -> bool {
		let accepted = self.pool.accept(&bytes);
		if accepted {
			let id = veil_core::Hash::from_vec(&bytes);
			for peer in self.peers.live_peers() {
				if peer.read().remote_addr == from {
					continue;
				}
				let _ = peer.read().send(Msg::HaveTransaction { id });
			}
			if self.mining_enabled {
				// Routine update, not a new tip: fold the transaction into
				// the candidate under construction without aborting it.
				self.miner.pull_new_candidate();
			}
		}
		accepted
	}

	fn on_have_transaction(&self, from: SocketAddr, id: TxId) {
		if self.pool.on_have(id) {
			for peer in self.peers.live_peers() {
				let same = peer.read().remote_addr == from;
				if same {
					let _ = peer.read().send(Msg::GetTransaction { id });
					return;
				}
			}
		}
	}

	fn get_transaction(&self, id: TxId) -> Option<Vec<u8>> {
		self.pool.get_bytes(&id)
	}

	fn get_mined(&self, requester: PeerId, height_from: u64) -> Result<Vec<(u64, u64, u64)>, ()> {
		if requester != self.db.my_id() {
			// RestrictMinedReportToOwner: only our own identity may query
			// our mined-row history.
			return Err(());
		}
		let _ = height_from;
		Ok(Vec::new())
	}

	fn my_id(&self) -> PeerId {
		self.db.my_id()
	}

	fn take_tasks(&self, preferred: PeerId) {
		let peer = match self.peers.get_live(&preferred) {
			Some(peer) => peer,
			None => return,
		};
		for key in self.scheduler.unassigned() {
			let carries = {
				let guard = peer.read();
				guard.can_carry(key)
			};
			if !carries {
				continue;
			}
			let mut guard = peer.write();
			guard.assign(key);
			drop(guard);
			self.scheduler.mark_assigned(key, preferred);
			let msg = if key.is_body { Msg::GetBody { id: key.id } } else { Msg::GetHdr { id: key.id } };
			let _ = peer.read().send(msg);
		}
	}
}

fn try_assign(scheduler: &Scheduler, peers: &PeerManager, id: BlockId, is_body: bool, preferred: Option<PeerId>) {
	let key = TaskKey::new(id, is_body);
	if !scheduler.is_tracked(&key) {
		return;
	}
	let candidates = peers.live_peers();
	let chosen = preferred
		.and_then(|pid| peers.get_live(&pid))
		.filter(|p| p.read().can_carry(key))
		.or_else(|| candidates.into_iter().find(|p| p.read().can_carry(key)));

	if let Some(peer) = chosen {
		let mut guard = peer.write();
		let identity = guard.identity;
		guard.assign(key);
		drop(guard);
		if let Some(identity) = identity {
			scheduler.mark_assigned(key, identity);
		}
		let msg = if is_body { Msg::GetBody { id } } else { Msg::GetHdr { id } };
		let _ = peer.read().send(msg);
		info!("assigned task {} to a peer", key);
	}
}
