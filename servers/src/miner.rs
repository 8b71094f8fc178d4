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

//! `N` worker threads grinding on the current candidate, restartable
//! without tearing the threads down: named worker threads, a shared stop
//! signal checked between attempts. The actual proof-of-work algorithm is
//! out of scope, so workers grind a plain nonce search against the
//! difficulty the processor hands back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, info};

use veil_core::{Hashed, MiningCandidate, NodeProcessor, PeerId, StopFlag};

use crate::config::MiningConfig;

struct State {
	generation: u64,
	stop: StopFlag,
	candidate: Option<MiningCandidate>,
}

/// Orchestrates the mining worker pool. Does not itself decide *when* to
/// restart (that's the Node facade's job, in response to a new tip or a
/// debounce timer); `soft_restart`/`hard_restart` are the two primitives it
/// exposes.
pub struct Miner {
	processor: Arc<dyn NodeProcessor>,
	my_id: PeerId,
	config: MiningConfig,
	state: Mutex<State>,
	shutdown: Arc<AtomicBool>,
	attempts: AtomicU64,
	handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Miner {
	pub fn new(processor: Arc<dyn NodeProcessor>, my_id: PeerId, config: MiningConfig) -> Arc<Miner> {
		let miner = Arc::new(Miner {
			processor,
			my_id,
			config,
			state: Mutex::new(State { generation: 0, stop: StopFlag::new(), candidate: None }),
			shutdown: Arc::new(AtomicBool::new(false)),
			attempts: AtomicU64::new(0),
			handles: Mutex::new(Vec::new()),
		});
		if miner.config.enabled {
			miner.spawn_workers();
		}
		miner
	}

	fn spawn_workers(self: &Arc<Self>) {
		let mut handles = self.handles.lock().unwrap();
		for i in 0..self.config.worker_threads.max(1) {
			let miner = self.clone();
			let handle = thread::Builder::new()
				.name(format!("miner-{}", i))
				.spawn(move || miner.worker_loop())
				.expect("failed to spawn miner worker thread");
			handles.push(handle);
		}
		info!("miner started with {} workers", self.config.worker_threads);
	}

	fn worker_loop(self: Arc<Self>) {
		let mut nonce: u64 = 0;
		loop {
			if self.shutdown.load(Ordering::SeqCst) {
				return;
			}
			let (generation, stop, candidate) = {
				let state = self.state.lock().unwrap();
				(state.generation, state.stop.clone(), state.candidate.clone())
			};
			let candidate = match candidate {
				Some(c) => c,
				None => {
					thread::sleep(Duration::from_millis(50));
					continue;
				}
			};
			if stop.is_set() {
				thread::sleep(Duration::from_millis(10));
				continue;
			}
			nonce = nonce.wrapping_add(1);
			self.attempts.fetch_add(1, Ordering::Relaxed);
			if solves(&candidate, nonce) {
				self.on_found(generation, &stop, candidate, nonce);
			}
		}
	}

	fn on_found(&self, generation: u64, stop: &StopFlag, candidate: MiningCandidate, nonce: u64) {
		// HardAbortSafe: a solution found under a stale generation or after
		// this search was told to stop must never reach the processor.
		let current = self.state.lock().unwrap();
		if current.generation != generation || !current.stop.same(stop) || stop.is_set() {
			debug!("discarding stale mining result for generation {}", generation);
			return;
		}
		drop(current);

		let mut header = candidate.header.clone();
		header.bytes.extend_from_slice(&nonce.to_le_bytes());
		if self.processor.on_mined_header(header) != veil_core::DataStatus::Accepted {
			return;
		}
		let _ = self.processor.on_mined_body(candidate.header.id, candidate.body.clone());
	}

	/// Swap in a fresh candidate without touching the shared stop flag:
	/// workers reload `candidate` from `state` on every attempt, so they
	/// pick up the replacement on their own next pass instead of being
	/// told to abort. If the previous task is already solved (`stop` set),
	/// there's nothing left to replace and this is a no-op.
	pub fn soft_restart(&self, candidate: Option<MiningCandidate>) {
		let mut state = self.state.lock().unwrap();
		if state.stop.is_set() {
			return;
		}
		state.candidate = candidate.or_else(|| self.processor.build_candidate(self.my_id));
	}

	/// Tear down whatever is in flight right now: set the shared `stop` so
	/// workers bail out of their current attempt, bump `generation` so
	/// `on_found` rejects a result that was already racing in under the old
	/// one, and install a fresh `StopFlag` for the next candidate. Used on
	/// a new tip and on shutdown, never as a response to routine debounce.
	pub fn hard_restart(&self) {
		let mut state = self.state.lock().unwrap();
		state.stop.set();
		state.generation += 1;
		state.stop = StopFlag::new();
		state.candidate = self.processor.build_candidate(self.my_id);
	}

	pub fn pull_new_candidate(&self) {
		let candidate = self.processor.build_candidate(self.my_id);
		self.soft_restart(candidate);
	}

	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	pub fn shutdown(&self) {
		self.shutdown.store(true, Ordering::SeqCst);
		self.state.lock().unwrap().stop.set();
		let mut handles = self.handles.lock().unwrap();
		for handle in handles.drain(..) {
			let _ = handle.join();
		}
	}
}

/// Toy nonce search standing in for the real proof-of-work algorithm
/// (explicitly out of scope): a candidate "solves" once the blake2 hash of
/// its header bytes plus the nonce clears a target derived from
/// `difficulty`.
fn solves(candidate: &MiningCandidate, nonce: u64) -> bool {
	let mut bytes = candidate.header.bytes.clone();
	bytes.extend_from_slice(&nonce.to_le_bytes());
	let hash = bytes.hash();
	let leading = hash.as_bytes().iter().take_while(|b| **b == 0).count();
	let target_bytes = (candidate.difficulty.max(1).trailing_zeros() / 8) as usize;
	leading >= target_bytes
}

#[cfg(test)]
mod test {
	use super::*;
	use veil_core::{BlockId, DataStatus, Hash, HeaderDesc};

	struct FakeProcessor;
	impl NodeProcessor for FakeProcessor {
		fn enum_congestions(&self, _request: &mut dyn FnMut(BlockId, bool, Option<PeerId>)) {}
		fn on_state(&self, _header: HeaderDesc, _from: PeerId) -> DataStatus {
			DataStatus::Accepted
		}
		fn on_block(&self, _id: BlockId, _body: Vec<u8>, _from: PeerId) -> DataStatus {
			DataStatus::Accepted
		}
		fn validate_shard(&self, _id: BlockId, _body: &[u8], _shard: usize, _shard_count: usize) -> bool {
			true
		}
		fn finish_block(&self, _id: BlockId, _body: Vec<u8>, _from: PeerId, _all_valid: bool) -> DataStatus {
			DataStatus::Accepted
		}
		fn build_candidate(&self, _miner: PeerId) -> Option<MiningCandidate> {
			Some(MiningCandidate {
				header: HeaderDesc { id: BlockId { height: 1, hash: Hash::from_vec(b"h") }, previous: Hash::from_vec(b"p"), bytes: vec![1, 2, 3] },
				body: vec![4, 5, 6],
				fees: 0,
				difficulty: 1,
			})
		}
		fn on_mined_header(&self, _header: HeaderDesc) -> DataStatus {
			DataStatus::Accepted
		}
		fn on_mined_body(&self, _id: BlockId, _body: Vec<u8>) -> DataStatus {
			DataStatus::Accepted
		}
		fn tip_height(&self) -> u64 {
			1
		}
	}

	#[test]
	fn soft_restart_swaps_candidate_without_touching_stop_or_generation() {
		let miner = Miner::new(Arc::new(FakeProcessor), PeerId::default(), MiningConfig { enabled: false, worker_threads: 0 });
		let gen0 = miner.state.lock().unwrap().generation;
		let stop0 = miner.state.lock().unwrap().stop.clone();
		miner.soft_restart(None);
		let state = miner.state.lock().unwrap();
		assert_eq!(state.generation, gen0);
		assert!(state.stop.same(&stop0));
		assert!(!state.stop.is_set());
		assert!(state.candidate.is_some());
	}

	#[test]
	fn soft_restart_is_a_no_op_once_stop_is_set() {
		let miner = Miner::new(Arc::new(FakeProcessor), PeerId::default(), MiningConfig { enabled: false, worker_threads: 0 });
		miner.state.lock().unwrap().stop.set();
		miner.soft_restart(None);
		assert!(miner.state.lock().unwrap().candidate.is_none());
	}

	#[test]
	fn hard_restart_bumps_generation_and_replaces_stop() {
		let miner = Miner::new(Arc::new(FakeProcessor), PeerId::default(), MiningConfig { enabled: false, worker_threads: 0 });
		let gen0 = miner.state.lock().unwrap().generation;
		let stop0 = miner.state.lock().unwrap().stop.clone();
		miner.hard_restart();
		let state = miner.state.lock().unwrap();
		assert_eq!(state.generation, gen0 + 1);
		assert!(stop0.is_set());
		assert!(!state.stop.same(&stop0));
		assert!(!state.stop.is_set());
		assert!(state.candidate.is_some());
	}

	#[test]
	fn difficulty_one_always_solves() {
		let candidate = MiningCandidate {
			header: HeaderDesc { id: BlockId { height: 1, hash: Hash::from_vec(b"h") }, previous: Hash::from_vec(b"p"), bytes: vec![9] },
			body: vec![],
			fees: 0,
			difficulty: 1,
		};
		assert!(solves(&candidate, 0));
	}
}
