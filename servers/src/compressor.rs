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

//! Background macroblock aggregation: once the tip clears `threshold`
//! blocks past the last macroblock, pair up ranges and squash them, never
//! letting the backlog grow past `max_backlog` outstanding merges.
//! `export_range`/`macroblock_insert` are the only `NodeDB` calls this
//! module makes, same "ask the owner, don't reach past it" pattern the
//! miner uses via `build_candidate`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, info, warn};

use veil_core::{CompressorConfig, NodeDB, StopFlag};

/// One pending merge: a contiguous height range not yet folded into a
/// macroblock.
#[derive(Debug, Clone, Copy)]
struct PendingRange {
	from: u64,
	to: u64,
}

/// A `naggling`-sized slice that has been exported but not yet squashed
/// into its neighbors.
struct Chunk {
	from: u64,
	to: u64,
	streams: Vec<Vec<u8>>,
}

/// Merge the top two chunks on the stack into one spanning both ranges.
fn squash_once(stack: &mut Vec<Chunk>) {
	let b = stack.pop().expect("squash_once needs at least two chunks");
	let a = stack.pop().expect("squash_once needs at least two chunks");
	debug!("squashing {}..{} with {}..{}", a.from, a.to, b.from, b.to);
	let mut streams = a.streams;
	streams.extend(b.streams);
	stack.push(Chunk { from: a.from, to: b.to, streams });
}

struct Shared {
	config: CompressorConfig,
	db: Arc<dyn NodeDB>,
	stop: StopFlag,
	backlog: Mutex<VecDeque<PendingRange>>,
	running: AtomicBool,
}

/// The compressor worker. Owns one background thread; `notify_tip` is how
/// the reactor tells it the chain advanced.
pub struct Compressor {
	shared: Arc<Shared>,
	handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Compressor {
	pub fn new(db: Arc<dyn NodeDB>, config: CompressorConfig) -> Arc<Compressor> {
		let shared = Arc::new(Shared {
			config,
			db,
			stop: StopFlag::new(),
			backlog: Mutex::new(VecDeque::new()),
			running: AtomicBool::new(false),
		});
		Arc::new(Compressor { shared, handle: Mutex::new(None) })
	}

	/// Called by the reactor when the tip advances to `height`. Queues a
	/// merge range if we've now crossed `threshold` past the last
	/// macroblock, and spins up the worker thread if it isn't already
	/// running.
	pub fn notify_tip(self: &Arc<Self>, height: u64) {
		let last = self.shared.db.last_macroblock_height().unwrap_or(0);
		if height < last + self.shared.config.threshold as u64 {
			return;
		}
		if height <= last || self.shared.db.has_macroblock(height) {
			return;
		}
		self.shared.backlog.lock().unwrap().push_back(PendingRange { from: last, to: height });
		self.ensure_running();
	}

	fn ensure_running(self: &Arc<Self>) {
		if self.shared.running.swap(true, Ordering::SeqCst) {
			return;
		}
		let shared = self.shared.clone();
		let handle = thread::Builder::new()
			.name("compressor".to_string())
			.spawn(move || Self::run(shared))
			.expect("failed to spawn compressor thread");
		*self.handle.lock().unwrap() = Some(handle);
	}

	fn run(shared: Arc<Shared>) {
		info!("compressor worker started");
		loop {
			if shared.stop.is_set() {
				break;
			}
			let next = {
				let mut backlog = shared.backlog.lock().unwrap();
				if backlog.len() > shared.config.max_backlog {
					warn!("compressor backlog exceeds max_backlog, dropping oldest range");
					backlog.pop_front();
				}
				backlog.pop_front()
			};
			let range = match next {
				Some(r) => r,
				None => {
					shared.running.store(false, Ordering::SeqCst);
					return;
				}
			};
			if let Err(e) = Self::squash_range(&shared, range) {
				warn!("export_range failed for {}..{}: {}, will retry on next tip", range.from, range.to, e);
			}
		}
	}

	/// Chunk `range` into `naggling`-sized pieces, exporting each as it's
	/// reached and squashing pairs together the moment the running chunk
	/// count has a trailing one bit — the same pairwise-merge carry pattern
	/// a binary counter uses, so the stack never holds more than O(log n)
	/// unmerged chunks. Ranges narrower than `min_aggregate` aren't worth
	/// compressing at all.
	fn squash_range(shared: &Shared, range: PendingRange) -> Result<(), String> {
		if range.to - range.from < shared.config.min_aggregate {
			debug!("range {}..{} below min_aggregate, skipping", range.from, range.to);
			return Ok(());
		}
		let naggling = shared.config.naggling.max(1);
		let mut stack: Vec<Chunk> = Vec::new();
		let mut pos = range.from;
		let mut i: u32 = 0;
		while pos < range.to {
			let chunk_to = (pos + naggling).min(range.to);
			let streams = shared.db.export_range(pos, chunk_to)?;
			stack.push(Chunk { from: pos, to: chunk_to, streams });
			pos = chunk_to;

			let mut j = i;
			while j & 1 == 1 {
				squash_once(&mut stack);
				j >>= 1;
			}
			i += 1;
		}
		while stack.len() > 1 {
			squash_once(&mut stack);
		}
		if let Some(merged) = stack.pop() {
			debug!("compressing {} streams for range {}..{}", merged.streams.len(), merged.from, merged.to);
			shared.db.macroblock_insert(merged.to);
		}
		Ok(())
	}

	pub fn shutdown(&self) {
		self.shared.stop.set();
		if let Some(handle) = self.handle.lock().unwrap().take() {
			let _ = handle.join();
		}
	}

	pub fn backlog_len(&self) -> usize {
		self.shared.backlog.lock().unwrap().len()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::Mutex as StdMutex;

	struct FakeDb {
		macroblocks: StdMutex<Vec<u64>>,
		export_calls: StdMutex<Vec<(u64, u64)>>,
	}
	impl FakeDb {
		fn new() -> FakeDb {
			FakeDb { macroblocks: StdMutex::new(vec![]), export_calls: StdMutex::new(vec![]) }
		}
	}
	impl NodeDB for FakeDb {
		fn my_id(&self) -> veil_core::PeerId {
			veil_core::PeerId::default()
		}
		fn get_header(&self, _id: &veil_core::BlockId) -> Option<veil_core::HeaderDesc> {
			None
		}
		fn get_body(&self, _id: &veil_core::BlockId) -> Option<Vec<u8>> {
			None
		}
		fn mined_insert(&self, _row: u64, _height: u64, _fees: u64) {}
		fn export_range(&self, from: u64, to: u64) -> Result<Vec<Vec<u8>>, String> {
			self.export_calls.lock().unwrap().push((from, to));
			Ok(vec![vec![1]])
		}
		fn macroblock_insert(&self, height: u64) {
			self.macroblocks.lock().unwrap().push(height);
		}
		fn has_macroblock(&self, height: u64) -> bool {
			self.macroblocks.lock().unwrap().contains(&height)
		}
		fn last_macroblock_height(&self) -> Option<u64> {
			self.macroblocks.lock().unwrap().last().copied()
		}
	}

	#[test]
	fn below_threshold_does_not_queue() {
		let db = Arc::new(FakeDb::new());
		let compressor = Compressor::new(db, CompressorConfig { threshold: 1000, min_aggregate: 10, naggling: 10, max_backlog: 10 });
		compressor.notify_tip(5);
		assert_eq!(compressor.backlog_len(), 0);
	}

	#[test]
	fn crossing_threshold_eventually_inserts_macroblock() {
		let db = Arc::new(FakeDb::new());
		let compressor = Compressor::new(db.clone(), CompressorConfig { threshold: 2, min_aggregate: 1, naggling: 2, max_backlog: 10 });
		compressor.notify_tip(10);
		for _ in 0..50 {
			if !db.macroblocks.lock().unwrap().is_empty() {
				break;
			}
			thread::sleep(std::time::Duration::from_millis(10));
		}
		compressor.shutdown();
		assert!(!db.macroblocks.lock().unwrap().is_empty());
	}

	#[test]
	fn squash_range_below_min_aggregate_skips_export() {
		let db = Arc::new(FakeDb::new());
		let shared = Shared {
			config: CompressorConfig { threshold: 0, min_aggregate: 100, naggling: 10, max_backlog: 10 },
			db: db.clone(),
			stop: StopFlag::new(),
			backlog: Mutex::new(VecDeque::new()),
			running: AtomicBool::new(false),
		};
		Compressor::squash_range(&shared, PendingRange { from: 0, to: 10 }).unwrap();
		assert!(db.export_calls.lock().unwrap().is_empty());
		assert!(db.macroblocks.lock().unwrap().is_empty());
	}

	#[test]
	fn squash_range_chunks_by_naggling_and_squashes_pairwise() {
		let db = Arc::new(FakeDb::new());
		let shared = Shared {
			config: CompressorConfig { threshold: 0, min_aggregate: 1, naggling: 2, max_backlog: 10 },
			db: db.clone(),
			stop: StopFlag::new(),
			backlog: Mutex::new(VecDeque::new()),
			running: AtomicBool::new(false),
		};
		Compressor::squash_range(&shared, PendingRange { from: 0, to: 10 }).unwrap();
		let calls = db.export_calls.lock().unwrap();
		assert_eq!(calls.len(), 5);
		assert_eq!(*calls, vec![(0, 2), (2, 4), (4, 6), (6, 8), (8, 10)]);
		assert_eq!(*db.macroblocks.lock().unwrap(), vec![10]);
	}
}
