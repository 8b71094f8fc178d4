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

//! Peer ratings, bans and the set of connected sessions: a reputation
//! score the scheduler and the outbound-connection tick both read from.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use veil_core::PeerId;

use crate::peer::Peer;

const REWARD_HEADER: i32 = 2;
const REWARD_BLOCK: i32 = 10;
const PENALTY_TIMEOUT: i32 = -10;
const BAN_THRESHOLD: i32 = -100;

/// What we remember about a peer identity, independent of whether it is
/// currently connected (`live` is `None` when it isn't).
pub struct PeerInfo {
	pub id: PeerId,
	pub addr: SocketAddr,
	pub rating: i32,
	pub banned: bool,
	pub live: Option<Arc<RwLock<Peer>>>,
}

impl PeerInfo {
	fn new(id: PeerId, addr: SocketAddr) -> PeerInfo {
		PeerInfo { id, addr, rating: 0, banned: false, live: None }
	}
}

/// Registry of every peer identity we've ever connected to or learned the
/// address of, plus the subset currently live. At most one live `Peer`
/// is kept per identity.
pub struct PeerManager {
	inner: RwLock<HashMap<PeerId, PeerInfo>>,
	fan_out: usize,
}

impl PeerManager {
	pub fn new(fan_out: usize) -> PeerManager {
		PeerManager { inner: RwLock::new(HashMap::new()), fan_out }
	}

	/// Record a known address without connecting (e.g. learned from a
	/// beacon datagram or a future peer-exchange message).
	pub fn learn(&self, id: PeerId, addr: SocketAddr) {
		let mut inner = self.inner.write();
		inner.entry(id).or_insert_with(|| PeerInfo::new(id, addr));
	}

	/// Register a freshly identified, live connection. If another live
	/// session already exists for this identity, the newer one wins and the
	/// older is returned so the caller can close it (see DESIGN.md's
	/// resolution of the duplicate-identity open question).
	pub fn set_live(&self, id: PeerId, addr: SocketAddr, peer: Arc<RwLock<Peer>>) -> Option<Arc<RwLock<Peer>>> {
		let mut inner = self.inner.write();
		let info = inner.entry(id).or_insert_with(|| PeerInfo::new(id, addr));
		info.addr = addr;
		let previous = info.live.take();
		info.live = Some(peer);
		previous
	}

	pub fn clear_live(&self, id: &PeerId) {
		if let Some(info) = self.inner.write().get_mut(id) {
			info.live = None;
		}
	}

	pub fn get_live(&self, id: &PeerId) -> Option<Arc<RwLock<Peer>>> {
		self.inner.read().get(id).and_then(|i| i.live.clone())
	}

	pub fn live_peers(&self) -> Vec<Arc<RwLock<Peer>>> {
		self.inner.read().values().filter_map(|i| i.live.clone()).collect()
	}

	pub fn live_count(&self) -> usize {
		self.inner.read().values().filter(|i| i.live.is_some()).count()
	}

	pub fn reward_header(&self, id: PeerId) {
		self.adjust(id, REWARD_HEADER);
	}

	pub fn reward_block(&self, id: PeerId) {
		self.adjust(id, REWARD_BLOCK);
	}

	pub fn penalty_timeout(&self, id: PeerId) {
		self.adjust(id, PENALTY_TIMEOUT);
	}

	pub fn ban(&self, id: PeerId) {
		let mut inner = self.inner.write();
		if let Some(info) = inner.get_mut(&id) {
			info.banned = true;
			info.rating = BAN_THRESHOLD;
			info!("banned peer {:?}", id);
		}
	}

	pub fn is_banned(&self, id: &PeerId) -> bool {
		self.inner.read().get(id).map(|i| i.banned).unwrap_or(false)
	}

	fn adjust(&self, id: PeerId, delta: i32) {
		let mut inner = self.inner.write();
		if let Some(info) = inner.get_mut(&id) {
			info.rating += delta;
			if info.rating <= BAN_THRESHOLD {
				info.banned = true;
			}
			debug!("peer {:?} rating now {}", id, info.rating);
		}
	}

	/// Addresses worth dialing right now: not banned, not already live,
	/// highest rating first, capped at however many more outbound slots
	/// `peer_fan_out` leaves open. Called from the reactor's 1Hz tick; the
	/// actual `connect()` call is the owner's job since it needs a
	/// `Transport` implementation this crate doesn't provide.
	pub fn due_for_connect(&self) -> Vec<SocketAddr> {
		let inner = self.inner.read();
		let live = inner.values().filter(|i| i.live.is_some()).count();
		if live >= self.fan_out {
			return Vec::new();
		}
		let mut candidates: Vec<&PeerInfo> = inner.values().filter(|i| !i.banned && i.live.is_none()).collect();
		candidates.sort_by(|a, b| b.rating.cmp(&a.rating));
		candidates.into_iter().take(self.fan_out - live).map(|i| i.addr).collect()
	}

	/// Drop bookkeeping for identities that are banned and not live, so the
	/// registry doesn't grow without bound.
	pub fn prune_banned(&self) {
		self.inner.write().retain(|_, info| !info.banned || info.live.is_some());
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn addr(n: u16) -> SocketAddr {
		format!("127.0.0.1:{}", n).parse().unwrap()
	}

	#[test]
	fn rating_crosses_ban_threshold() {
		let pm = PeerManager::new(8);
		let id = PeerId([9u8; 32]);
		pm.learn(id, addr(1));
		for _ in 0..20 {
			pm.penalty_timeout(id);
		}
		assert!(pm.is_banned(&id));
	}

	#[test]
	fn due_for_connect_excludes_banned_and_live() {
		let pm = PeerManager::new(1);
		let a = PeerId([1u8; 32]);
		let b = PeerId([2u8; 32]);
		pm.learn(a, addr(1));
		pm.learn(b, addr(2));
		pm.ban(a);
		let due = pm.due_for_connect();
		assert_eq!(due, vec![addr(2)]);
	}

	#[test]
	fn due_for_connect_respects_fan_out() {
		let pm = PeerManager::new(1);
		let a = PeerId([1u8; 32]);
		let b = PeerId([2u8; 32]);
		pm.learn(a, addr(1));
		pm.learn(b, addr(2));
		assert_eq!(pm.due_for_connect().len(), 1);
	}
}
