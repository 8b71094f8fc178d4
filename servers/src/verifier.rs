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

//! A fixed pool of worker threads that run arbitrary verification jobs off
//! the reactor thread, tagged with a generation counter so a reorg can
//! discard any results still in flight for the old generation: named
//! worker threads spawned once and parked on a condvar between jobs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::info;

type Job = Box<dyn FnOnce() + Send>;

struct Shared {
	queue: Mutex<VecDeque<(u64, Job)>>,
	not_empty: Condvar,
	not_full: Condvar,
	capacity: usize,
	generation: AtomicU64,
	shutdown: std::sync::atomic::AtomicBool,
	active: AtomicUsize,
}

/// Shared state for one in-flight `submit_block` call: how many shards are
/// still outstanding and whether any of them has failed so far.
struct BlockTask {
	remaining: usize,
	fail: bool,
}

/// Pool of `worker_threads` verification workers. Submitted jobs are tagged
/// with the pool's current generation; `bump_generation` invalidates
/// everything still queued (workers still run queued jobs, but check the
/// generation before invoking the closure so stale work is a no-op).
pub struct VerifierPool {
	shared: Arc<Shared>,
	handles: Vec<thread::JoinHandle<()>>,
	worker_threads: usize,
}

impl VerifierPool {
	pub fn new(worker_threads: usize, capacity: usize) -> VerifierPool {
		let worker_threads = worker_threads.max(1);
		let shared = Arc::new(Shared {
			queue: Mutex::new(VecDeque::new()),
			not_empty: Condvar::new(),
			not_full: Condvar::new(),
			capacity,
			generation: AtomicU64::new(0),
			shutdown: std::sync::atomic::AtomicBool::new(false),
			active: AtomicUsize::new(0),
		});

		let mut handles = Vec::with_capacity(worker_threads);
		for i in 0..worker_threads {
			let shared = shared.clone();
			let handle = thread::Builder::new()
				.name(format!("verifier-{}", i))
				.spawn(move || Self::run(shared))
				.expect("failed to spawn verifier worker thread");
			handles.push(handle);
		}
		info!("verifier pool started with {} workers", worker_threads);
		VerifierPool { shared, handles, worker_threads }
	}

	fn run(shared: Arc<Shared>) {
		loop {
			let (generation, job) = {
				let mut queue = shared.queue.lock().unwrap();
				while queue.is_empty() && !shared.shutdown.load(Ordering::SeqCst) {
					queue = shared.not_empty.wait(queue).unwrap();
				}
				if shared.shutdown.load(Ordering::SeqCst) && queue.is_empty() {
					return;
				}
				let item = queue.pop_front().unwrap();
				shared.not_full.notify_one();
				item
			};
			if generation == shared.generation.load(Ordering::SeqCst) {
				shared.active.fetch_add(1, Ordering::SeqCst);
				job();
				shared.active.fetch_sub(1, Ordering::SeqCst);
			}
		}
	}

	/// Queue `job`, blocking the caller if the pool is at capacity
	/// (backpressure, same discipline grin's miner loop uses to avoid
	/// unbounded memory growth under a burst of incoming blocks).
	pub fn submit<F: FnOnce() + Send + 'static>(&self, job: F) {
		let generation = self.shared.generation.load(Ordering::SeqCst);
		let mut queue = self.shared.queue.lock().unwrap();
		while queue.len() >= self.shared.capacity {
			queue = self.shared.not_full.wait(queue).unwrap();
		}
		queue.push_back((generation, Box::new(job)));
		self.shared.not_empty.notify_one();
	}

	/// Split one block's validation into `shard_count` independent shards
	/// and run them across the pool, blocking until every shard reports
	/// back. Mirrors `Verifier::Thread`: a shared remaining-count and
	/// fail-flag under one lock, each shard decrementing as it finishes and
	/// waking this call on the last one. Returns whether every shard
	/// reported success.
	pub fn submit_block<F>(&self, shard_count: usize, shard: F) -> bool
	where
		F: Fn(usize) -> bool + Send + Sync + 'static,
	{
		let shard_count = shard_count.max(1);
		let shard = Arc::new(shard);
		let state = Arc::new((Mutex::new(BlockTask { remaining: shard_count, fail: false }), Condvar::new()));

		for i in 0..shard_count {
			let shard = shard.clone();
			let state = state.clone();
			self.submit(move || {
				let ok = shard(i);
				let (lock, cvar) = &*state;
				let mut task = lock.lock().unwrap();
				if !ok {
					task.fail = true;
				}
				task.remaining -= 1;
				if task.remaining == 0 {
					cvar.notify_one();
				}
			});
		}

		let (lock, cvar) = &*state;
		let mut task = lock.lock().unwrap();
		while task.remaining > 0 {
			task = cvar.wait(task).unwrap();
		}
		!task.fail
	}

	/// Invalidate every job still queued for the previous generation (e.g.
	/// on a reorg that makes in-flight verification moot).
	pub fn bump_generation(&self) {
		self.shared.generation.fetch_add(1, Ordering::SeqCst);
	}

	/// How many shards `submit_block` should split a block into.
	pub fn worker_threads(&self) -> usize {
		self.worker_threads
	}

	pub fn queued(&self) -> usize {
		self.shared.queue.lock().unwrap().len()
	}

	pub fn active(&self) -> usize {
		self.shared.active.load(Ordering::SeqCst)
	}
}

impl Drop for VerifierPool {
	fn drop(&mut self) {
		self.shared.shutdown.store(true, Ordering::SeqCst);
		self.shared.not_empty.notify_all();
		for handle in self.handles.drain(..) {
			let _ = handle.join();
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::mpsc;

	#[test]
	fn submit_block_runs_every_shard_and_ands_the_results() {
		let pool = VerifierPool::new(4, 8);
		let seen = Arc::new(Mutex::new(Vec::new()));
		let seen_for_shard = seen.clone();
		let all_valid = pool.submit_block(4, move |i| {
			seen_for_shard.lock().unwrap().push(i);
			true
		});
		assert!(all_valid);
		let mut got = seen.lock().unwrap().clone();
		got.sort();
		assert_eq!(got, vec![0, 1, 2, 3]);
	}

	#[test]
	fn submit_block_fails_if_any_shard_fails() {
		let pool = VerifierPool::new(3, 8);
		let all_valid = pool.submit_block(3, |i| i != 1);
		assert!(!all_valid);
	}

	#[test]
	fn jobs_run_and_report_back() {
		let pool = VerifierPool::new(2, 8);
		let (tx, rx) = mpsc::channel();
		for i in 0..4 {
			let tx = tx.clone();
			pool.submit(move || tx.send(i).unwrap());
		}
		let mut got: Vec<i32> = (0..4).map(|_| rx.recv().unwrap()).collect();
		got.sort();
		assert_eq!(got, vec![0, 1, 2, 3]);
	}

	#[test]
	fn stale_generation_jobs_are_skipped() {
		let pool = VerifierPool::new(1, 8);
		let (release_tx, release_rx) = mpsc::channel::<()>();
		pool.submit(move || {
			let _ = release_rx.recv();
		});

		let (stale_tx, stale_rx) = mpsc::channel();
		pool.submit(move || stale_tx.send(true).unwrap());

		pool.bump_generation();

		let (fresh_tx, fresh_rx) = mpsc::channel();
		pool.submit(move || fresh_tx.send(true).unwrap());

		release_tx.send(()).unwrap();

		assert!(fresh_rx.recv_timeout(std::time::Duration::from_secs(1)).is_ok());
		assert!(stale_rx.recv_timeout(std::time::Duration::from_millis(50)).is_err());
	}
}
