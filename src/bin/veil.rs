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

//! Entry point: parse arguments, bring up logging, load the server
//! configuration and start the node. The real validation/storage engine is
//! an external collaborator (see `veil_core::processor`); until one is
//! wired in, the binary runs against the in-memory fakes from
//! `veil_servers::test_support` so the rest of the stack is exercisable
//! end to end.

extern crate clap;
extern crate ctrlc;
extern crate log;
extern crate serde_json;

extern crate veil_core;
extern crate veil_p2p;
extern crate veil_pool;
extern crate veil_servers;
extern crate veil_util;

use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{App, Arg};
use log::{error, info, warn};

use veil_core::PeerId;
use veil_p2p::{Beacon, NodeAdapter};
use veil_pool::TxPool;
use veil_servers::config::ServerConfig;
use veil_servers::node::Node;
use veil_servers::test_support::{FakeDb, FakeMempool, FakeProcessor};

fn load_config(path: Option<&str>) -> ServerConfig {
	let path = match path {
		Some(p) => PathBuf::from(p),
		None => return ServerConfig::default(),
	};
	let mut contents = String::new();
	match File::open(&path).and_then(|mut f| f.read_to_string(&mut contents)) {
		Ok(_) => match serde_json::from_str(&contents) {
			Ok(cfg) => cfg,
			Err(e) => {
				error!("failed to parse {}: {}, using defaults", path.display(), e);
				ServerConfig::default()
			}
		},
		Err(e) => {
			warn!("could not read {}: {}, using defaults", path.display(), e);
			ServerConfig::default()
		}
	}
}

fn main() {
	let matches = App::new("veil")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Simple, private and scalable cryptocurrency node based on the MimbleWimble chain format.")
		.arg(Arg::with_name("config").short("c").long("config").takes_value(true).help("Path to a JSON server config file"))
		.arg(Arg::with_name("mine").short("m").long("mine").help("Enable mining"))
		.get_matches();

	let mut config = load_config(matches.value_of("config"));
	if matches.is_present("mine") {
		config.mining_config.enabled = true;
	}

	veil_util::init_logger(config.logging.clone());

	info!("veil starting, db_root={}", config.db_root);

	let processor = Arc::new(FakeProcessor::new());
	let db = Arc::new(FakeDb::new(PeerId::default()));
	let pool = Arc::new(TxPool::new(FakeMempool::new()));
	let node = Node::new(processor, db, pool, &config);

	let running = Arc::new(AtomicBool::new(true));
	let running_handler = running.clone();
	if let Err(e) = ctrlc::set_handler(move || {
		info!("shutting down...");
		running_handler.store(false, Ordering::SeqCst);
	}) {
		warn!("failed to install ctrl-c handler: {}", e);
	}

	let broadcast_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), config.p2p_config.port);
	let beacon_period = Duration::from_millis(config.timeouts.beacon_period_ms as u64);
	let mut beacon = match Beacon::bind(config.p2p_config.port, broadcast_addr, beacon_period, node.cfg_checksum(), node.my_id()) {
		Ok(b) => Some(b),
		Err(e) => {
			warn!("failed to bind LAN discovery beacon: {}, discovery disabled", e);
			None
		}
	};

	while running.load(Ordering::SeqCst) {
		node.refresh_congestions_now();
		node.sweep_peer_timeouts(Instant::now());
		node.fire_wanted_timer(Instant::now());
		let due = node.peers.due_for_connect();
		if !due.is_empty() {
			info!("{} outbound slot(s) open, no transport wired in yet", due.len());
		}
		if let Some(beacon) = beacon.as_mut() {
			if let Err(e) = beacon.tick(config.p2p_config.port) {
				warn!("beacon send failed: {}", e);
			}
			for (announcement, from) in beacon.recv() {
				let addr = SocketAddr::new(from.ip(), announcement.listen_port);
				node.peers.learn(announcement.id, addr);
			}
		}
		thread::sleep(Duration::from_millis(1_000));
	}

	node.miner.shutdown();
	node.compressor.shutdown();
	info!("veil stopped");
}
