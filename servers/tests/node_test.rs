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

//! End-to-end exercises against the in-memory `FakeProcessor`/`FakeDb`,
//! covering the request/assign/accept cycle and the tx pool relay path.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use veil_core::{BlockId, Hash, PeerId};
use veil_p2p::{Error, Msg, NodeAdapter, Peer, Transport};
use veil_pool::TxPool;
use veil_servers::config::ServerConfig;
use veil_servers::node::Node;
use veil_servers::test_support::{FakeDb, FakeMempool, FakeProcessor};

struct RecordingTransport {
	addr: SocketAddr,
	sent: Mutex<Vec<Msg>>,
}

impl Transport for RecordingTransport {
	fn send(&self, msg: Msg) -> Result<(), Error> {
		self.sent.lock().unwrap().push(msg);
		Ok(())
	}
	fn remote_addr(&self) -> SocketAddr {
		self.addr
	}
	fn close(&self) {}
}

fn build_node() -> Arc<Node<FakeMempool>> {
	let processor = Arc::new(FakeProcessor::new());
	let db = Arc::new(FakeDb::new(PeerId([0u8; 32])));
	let pool = Arc::new(TxPool::new(FakeMempool::new()));
	let config = ServerConfig::default();
	Node::new(processor, db, pool, &config)
}

#[test]
fn requesting_a_height_assigns_it_to_a_live_peer() {
	let node = build_node();
	let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
	let transport = Arc::new(RecordingTransport { addr, sent: Mutex::new(vec![]) });
	let mut peer = Peer::new(transport.clone(), node.clone());
	let other_id = PeerId([5u8; 32]);
	peer.handle(Msg::PeerInfoSelf { id: other_id, listen_port: 11 }).unwrap();
	assert!(peer.is_live());

	let peer = Arc::new(parking_lot::RwLock::new(peer));
	node.peers.set_live(other_id, addr, peer.clone());

	let target = BlockId { height: 1, hash: Hash::from_vec(b"x") };
	node.request_data(target, false, None);

	assert_eq!(peer.read().tasks.len(), 1);
	let sent = transport.sent.lock().unwrap();
	assert!(matches!(sent.last(), Some(Msg::GetHdr { .. })));
}

#[test]
fn new_transaction_is_accepted_once() {
	let node = build_node();
	let addr: SocketAddr = "127.0.0.1:9002".parse().unwrap();
	assert!(node.on_new_transaction(addr, b"tx-a".to_vec()));
	assert!(!node.on_new_transaction(addr, b"tx-a".to_vec()));
}

#[test]
fn get_mined_refuses_non_owner() {
	let node = build_node();
	let stranger = PeerId([9u8; 32]);
	assert!(node.get_mined(stranger, 0).is_err());
	assert!(node.get_mined(node.my_id(), 0).is_ok());
}

#[test]
fn accepted_block_runs_through_the_verifier_pool() {
	let node = build_node();
	let from = PeerId([3u8; 32]);
	let id = BlockId { height: 1, hash: Hash::from_vec(b"blk") };
	let header = veil_core::HeaderDesc { id, previous: Hash::from_vec(b"genesis"), bytes: vec![1, 2, 3] };
	assert_eq!(node.on_header(header, from), veil_core::DataStatus::Accepted);
	assert_eq!(node.on_block(id, vec![9, 9, 9], from), veil_core::DataStatus::Accepted);

	let unknown = BlockId { height: 2, hash: Hash::from_vec(b"nope") };
	assert_eq!(node.on_block(unknown, vec![], from), veil_core::DataStatus::Rejected);
}
