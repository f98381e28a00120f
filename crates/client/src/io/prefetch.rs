// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! The shared readahead subsystem.
//!
//! A process-wide pool of reusable page buffers, a bounded worker pool, and
//! three disjoint lists (queued, in-progress, completed) forming a small cache
//! with an age- and consumption-aware eviction policy.
//!
//! One mutex protects the free stack, all three lists and the worker wake
//! condition variable. Each buffer additionally carries a one-shot completion
//! latch so readers can wait for an in-flight fill without holding the global
//! lock. A buffer moves through `NotAvailable -> Reading -> (Available |
//! Failed)` exactly once, and at all times
//! `|free| + |queued| + |in_progress| + |completed| == buffer_count`.
//!
//! Streams are referenced weakly: a worker whose owning stream has been
//! dropped completes with `Failed` and the slab is reclaimed by eviction.

use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, OnceLock, Weak},
    thread,
    time::{Duration, Instant},
};

use lakestore_core::CountDownLatch;

use crate::common::consts::{
    BLOCK_SIZE, PREFETCH_BUFFER_COUNT, PREFETCH_EVICTION_AGE, PREFETCH_WORKER_COUNT,
};

/// A stream-side data source the prefetcher can pull from.
///
/// Implemented by the input stream core; reads issued through this trait have
/// speculation disabled.
pub trait PrefetchSource: Send + Sync {
    /// A process-unique id for overlap matching.
    fn source_id(&self) -> u64;

    /// Reads up to `dst.len()` bytes at `offset`, returning the bytes read.
    ///
    /// # Errors
    ///
    /// Returns an error when the remote read fails after its retry policy is
    /// exhausted.
    fn read_remote(&self, offset: u64, dst: &mut [u8]) -> Result<usize, crate::http::error::LakeError>;
}

/// Lifecycle state of one prefetch buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferStatus {
    /// Queued; no worker has picked it up.
    NotAvailable,
    /// A worker is filling it.
    Reading,
    /// Filled; data can be served.
    Available,
    /// The fill failed; the slab has been reclaimed.
    Failed,
}

#[derive(Debug)]
struct BufferCell {
    status: BufferStatus,
    /// The slab, present while this record owns one. Workers take it out for
    /// the duration of the remote read.
    data: Option<Box<[u8]>>,
    filled: usize,
    birthday: Option<Instant>,
    first_byte_consumed: bool,
    last_byte_consumed: bool,
    any_byte_consumed: bool,
}

/// Bookkeeping for one queued/in-flight/completed readahead.
#[derive(Debug)]
pub struct ReadBuffer {
    source: Weak<dyn PrefetchSource>,
    source_id: u64,
    offset: u64,
    requested_len: usize,
    cell: Mutex<BufferCell>,
    done: CountDownLatch,
}

impl ReadBuffer {
    /// Returns `true` when this record covers `position` for `source_id`.
    ///
    /// The overlap test accepts any stored record containing the requested
    /// start offset, regardless of list or status. This is intentionally
    /// coarse: it doubles as the "already queued" check without
    /// distinguishing partial overlap from exact match.
    fn covers(&self, source_id: u64, position: u64) -> bool {
        self.source_id == source_id
            && position >= self.offset
            && position < self.offset + self.requested_len as u64
    }
}

#[derive(Debug)]
struct PoolInner {
    free: Vec<Box<[u8]>>,
    queued: VecDeque<Arc<ReadBuffer>>,
    in_progress: Vec<Arc<ReadBuffer>>,
    completed: Vec<Arc<ReadBuffer>>,
    shutdown: bool,
}

/// Tunables for a [`Prefetcher`]; contract defaults are 16 x 4 MiB slabs and
/// 8 workers.
#[derive(Clone, Copy, Debug)]
pub struct PrefetchConfig {
    /// Number of pre-allocated page buffers.
    pub buffer_count: usize,
    /// Size of each page buffer in bytes.
    pub block_size: usize,
    /// Number of long-lived worker threads.
    pub worker_count: usize,
    /// Minimum age before an unconsumed completed buffer becomes evictable.
    pub eviction_age: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            buffer_count: PREFETCH_BUFFER_COUNT,
            block_size: BLOCK_SIZE,
            worker_count: PREFETCH_WORKER_COUNT,
            eviction_age: PREFETCH_EVICTION_AGE,
        }
    }
}

/// Census of the pool's four buffer holdings, for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferCensus {
    /// Slabs on the free stack.
    pub free: usize,
    /// Records awaiting a worker.
    pub queued: usize,
    /// Records being filled.
    pub in_progress: usize,
    /// Records with servable data.
    pub completed: usize,
}

impl BufferCensus {
    /// Total slabs accounted for across all holdings.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.free + self.queued + self.in_progress + self.completed
    }
}

static GLOBAL: OnceLock<Arc<Prefetcher>> = OnceLock::new();

/// The process-wide readahead pool.
pub struct Prefetcher {
    inner: Mutex<PoolInner>,
    work_ready: Condvar,
    config: PrefetchConfig,
    started: CountDownLatch,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl std::fmt::Debug for Prefetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Prefetcher))
            .field("config", &self.config)
            .field("census", &self.census())
            .finish_non_exhaustive()
    }
}

impl Prefetcher {
    /// Constructs a pool with `config`, pre-allocating every slab and
    /// spawning the worker threads.
    ///
    /// Workers are barrier-initialized: they all wait on a single latch
    /// released once construction is complete.
    ///
    /// # Panics
    ///
    /// Panics if worker threads cannot be spawned.
    #[must_use]
    pub fn new(config: PrefetchConfig) -> Arc<Self> {
        let free = (0..config.buffer_count)
            .map(|_| vec![0u8; config.block_size].into_boxed_slice())
            .collect();

        let pool = Arc::new(Self {
            inner: Mutex::new(PoolInner {
                free,
                queued: VecDeque::new(),
                in_progress: Vec::new(),
                completed: Vec::new(),
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            config,
            started: CountDownLatch::new(1),
            workers: Mutex::new(Vec::with_capacity(config.worker_count)),
        });

        {
            let mut workers = pool.workers.lock().expect("worker list poisoned");
            for i in 0..config.worker_count {
                let pool = Arc::clone(&pool);
                let handle = thread::Builder::new()
                    .name(format!("lakestore-prefetch-{i}"))
                    .spawn(move || pool.worker_loop())
                    .expect("failed to spawn prefetch worker");
                workers.push(handle);
            }
        }

        pool.started.count_down();
        pool
    }

    /// Returns the process-wide pool, constructing it with contract defaults
    /// on first use.
    pub fn global() -> &'static Arc<Self> {
        GLOBAL.get_or_init(|| Self::new(PrefetchConfig::default()))
    }

    /// Returns this pool's configuration.
    #[must_use]
    pub const fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    /// Queues a readahead of `len` bytes at `offset` for `source`.
    ///
    /// Does nothing when an existing record for the source already covers
    /// `offset` (in any list), or when no slab can be obtained even after
    /// eviction. `len` is clamped to the slab size.
    ///
    /// # Panics
    ///
    /// Panics if the pool lock is poisoned.
    pub fn queue_readahead(&self, source: &Arc<dyn PrefetchSource>, offset: u64, len: usize) {
        if len == 0 {
            return;
        }
        let len = len.min(self.config.block_size);
        let source_id = source.source_id();

        let mut inner = self.inner.lock().expect("prefetch pool lock poisoned");
        if inner.shutdown {
            return;
        }

        let already_stored = inner
            .queued
            .iter()
            .chain(inner.in_progress.iter())
            .chain(inner.completed.iter())
            .any(|record| record.covers(source_id, offset));
        if already_stored {
            return;
        }

        let mut slab = inner.free.pop();
        if slab.is_none() {
            slab = self.evict_locked(&mut inner);
        }
        let Some(slab) = slab else {
            return;
        };

        let record = Arc::new(ReadBuffer {
            source: Arc::downgrade(source),
            source_id,
            offset,
            requested_len: len,
            cell: Mutex::new(BufferCell {
                status: BufferStatus::NotAvailable,
                data: Some(slab),
                filled: 0,
                birthday: None,
                first_byte_consumed: false,
                last_byte_consumed: false,
                any_byte_consumed: false,
            }),
            done: CountDownLatch::new(1),
        });

        inner.queued.push_back(record);
        drop(inner);
        self.work_ready.notify_one();
    }

    /// Serves up to `dst.len()` bytes at `position` from the cache.
    ///
    /// A matching record still sitting in the queue is cancelled instead (a
    /// synchronous read by the caller will be faster) and its slab reclaimed.
    /// A matching in-progress record is awaited via its completion latch.
    /// Returns the bytes copied, or 0 on a cache miss.
    ///
    /// # Panics
    ///
    /// Panics if the pool lock is poisoned.
    pub fn get_block(&self, source_id: u64, position: u64, dst: &mut [u8]) -> usize {
        let mut inner = self.inner.lock().expect("prefetch pool lock poisoned");

        // (a) Reclaim a matching record that has not started.
        if let Some(idx) = inner
            .queued
            .iter()
            .position(|record| record.covers(source_id, position))
        {
            let record = inner.queued.remove(idx).expect("index in range");
            let mut cell = record.cell.lock().expect("buffer cell poisoned");
            cell.status = BufferStatus::Failed;
            if let Some(slab) = cell.data.take() {
                inner.free.push(slab);
            }
            drop(cell);
            record.done.count_down();
        }

        // (b) Wait for a matching in-flight fill, off the global lock.
        let pending = inner
            .in_progress
            .iter()
            .find(|record| record.covers(source_id, position))
            .map(Arc::clone);
        if let Some(record) = pending {
            drop(inner);
            record.done.wait();
            inner = self.inner.lock().expect("prefetch pool lock poisoned");
        }

        // Serve from the completed list.
        for record in &inner.completed {
            if record.source_id != source_id {
                continue;
            }
            let mut cell = record.cell.lock().expect("buffer cell poisoned");
            let end = record.offset + cell.filled as u64;
            if position < record.offset || position >= end {
                continue;
            }
            let delta = (position - record.offset) as usize;
            let n = dst.len().min(cell.filled - delta);
            let slab = cell.data.as_ref().expect("completed buffer holds its slab");
            dst[..n].copy_from_slice(&slab[delta..delta + n]);
            if delta == 0 {
                cell.first_byte_consumed = true;
            }
            if delta + n == cell.filled {
                cell.last_byte_consumed = true;
            }
            cell.any_byte_consumed = true;
            return n;
        }

        0
    }

    /// Removes and returns the next queued record, blocking on the wake
    /// condition variable. Returns `None` once the pool is shut down.
    fn next_queued(&self) -> Option<Arc<ReadBuffer>> {
        let mut inner = self.inner.lock().expect("prefetch pool lock poisoned");
        loop {
            if inner.shutdown {
                return None;
            }
            if let Some(record) = inner.queued.pop_front() {
                record
                    .cell
                    .lock()
                    .expect("buffer cell poisoned")
                    .status = BufferStatus::Reading;
                inner.in_progress.push(Arc::clone(&record));
                return Some(record);
            }
            inner = self
                .work_ready
                .wait(inner)
                .expect("prefetch pool lock poisoned");
        }
    }

    /// Completes a fill: moves the record out of in-progress, publishing it
    /// to the completed list on success or reclaiming the slab on failure,
    /// then releases the record's completion latch.
    fn done_reading(&self, record: &Arc<ReadBuffer>, status: BufferStatus, bytes: usize, slab: Box<[u8]>) {
        {
            let mut inner = self.inner.lock().expect("prefetch pool lock poisoned");
            inner
                .in_progress
                .retain(|candidate| !Arc::ptr_eq(candidate, record));

            let mut cell = record.cell.lock().expect("buffer cell poisoned");
            if status == BufferStatus::Available && bytes > 0 {
                cell.status = BufferStatus::Available;
                cell.data = Some(slab);
                cell.filled = bytes;
                cell.birthday = Some(Instant::now());
                drop(cell);
                inner.completed.push(Arc::clone(record));
            } else {
                cell.status = BufferStatus::Failed;
                drop(cell);
                inner.free.push(slab);
            }
        }
        record.done.count_down();
    }

    /// Evicts one completed buffer and returns its slab, or `None`.
    ///
    /// Search order over the completed list (insertion order): fully consumed
    /// first, then partially consumed, then the oldest buffer older than the
    /// eviction age.
    fn evict_locked(&self, inner: &mut PoolInner) -> Option<Box<[u8]>> {
        let mut fully_consumed = None;
        let mut any_consumed = None;
        let mut oldest: Option<(usize, Instant)> = None;

        for (idx, record) in inner.completed.iter().enumerate() {
            let cell = record.cell.lock().expect("buffer cell poisoned");
            if fully_consumed.is_none() && cell.first_byte_consumed && cell.last_byte_consumed {
                fully_consumed = Some(idx);
                break;
            }
            if any_consumed.is_none() && cell.any_byte_consumed {
                any_consumed = Some(idx);
            }
            if let Some(birthday) = cell.birthday {
                match oldest {
                    Some((_, current)) if birthday >= current => {}
                    _ => oldest = Some((idx, birthday)),
                }
            }
        }

        let victim = fully_consumed.or(any_consumed).or_else(|| {
            oldest.and_then(|(idx, birthday)| {
                (birthday.elapsed() > self.config.eviction_age).then_some(idx)
            })
        })?;

        let record = inner.completed.remove(victim);
        let mut cell = record.cell.lock().expect("buffer cell poisoned");
        cell.data.take()
    }

    fn worker_loop(&self) {
        self.started.wait();
        while let Some(record) = self.next_queued() {
            // Take the slab out of the record so the remote read runs with no
            // lock held.
            let slab = record
                .cell
                .lock()
                .expect("buffer cell poisoned")
                .data
                .take()
                .expect("queued buffer holds its slab");
            self.process(&record, slab);
        }
    }

    fn process(&self, record: &Arc<ReadBuffer>, mut slab: Box<[u8]>) {
        let outcome = match record.source.upgrade() {
            Some(source) => {
                let len = record.requested_len.min(slab.len());
                source.read_remote(record.offset, &mut slab[..len])
            }
            None => {
                // Owning stream already closed; complete as failed so the slab
                // is reclaimed.
                Ok(0)
            }
        };

        match outcome {
            Ok(bytes) if bytes > 0 => {
                self.done_reading(record, BufferStatus::Available, bytes, slab);
            }
            Ok(_) => self.done_reading(record, BufferStatus::Failed, 0, slab),
            Err(error) => {
                tracing::debug!(
                    "readahead at offset {} failed: {error}",
                    record.offset
                );
                self.done_reading(record, BufferStatus::Failed, 0, slab);
            }
        }
    }

    /// Returns the current buffer census.
    ///
    /// # Panics
    ///
    /// Panics if the pool lock is poisoned.
    #[must_use]
    pub fn census(&self) -> BufferCensus {
        let inner = self.inner.lock().expect("prefetch pool lock poisoned");
        BufferCensus {
            free: inner.free.len(),
            queued: inner.queued.len(),
            in_progress: inner.in_progress.len(),
            completed: inner.completed.len(),
        }
    }

    /// Stops the workers and joins them. Queued records are abandoned with
    /// their latches released. Intended for tests; the global pool lives for
    /// the process lifetime.
    ///
    /// # Panics
    ///
    /// Panics if the pool lock is poisoned or a worker panicked.
    pub fn shutdown(&self) {
        {
            let mut guard = self.inner.lock().expect("prefetch pool lock poisoned");
            let inner = &mut *guard;
            inner.shutdown = true;
            for record in inner.queued.drain(..) {
                let mut cell = record.cell.lock().expect("buffer cell poisoned");
                cell.status = BufferStatus::Failed;
                if let Some(slab) = cell.data.take() {
                    inner.free.push(slab);
                }
                drop(cell);
                record.done.count_down();
            }
        }
        self.work_ready.notify_all();
        let workers: Vec<_> = self
            .workers
            .lock()
            .expect("worker list poisoned")
            .drain(..)
            .collect();
        for handle in workers {
            handle.join().expect("prefetch worker panicked");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
