//! Size-classed chunk pool.
//!
//! Requests are rounded up to the smallest configured class and served from
//! that class's free list, which is a lock-free bounded queue. Unrelated
//! classes never contend with each other; the only shared state is a pair of
//! atomic byte counters.
//!
//! Requests above `max_chunk_size` get an exact-length block that bypasses
//! the buckets and is freed on release. A zero-byte request yields the empty
//! chunk, which touches no counter.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use netmem_core::{NoopObserver, PoolConfig, PoolObserver};

use crate::chunk::{Chunk, Origin};
use crate::error::Result;
use crate::stats::{ClassStats, PoolStats};
use crate::tracking::PeakTracker;
use crate::view::View;

struct Bucket {
    class_size: usize,
    free: ArrayQueue<Box<[u8]>>,
    fresh: AtomicU64,
    reused: AtomicU64,
    in_use: AtomicUsize,
    max_in_use: AtomicUsize,
}

impl Bucket {
    fn new(class_size: usize, retain: usize) -> Self {
        Self {
            class_size,
            free: ArrayQueue::new(retain),
            fresh: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            in_use: AtomicUsize::new(0),
            max_in_use: AtomicUsize::new(0),
        }
    }

    fn take(&self) -> Box<[u8]> {
        let data = match self.free.pop() {
            Some(mut data) => {
                // Zero on reuse so no owner sees a previous owner's bytes.
                data.fill(0);
                self.reused.fetch_add(1, Ordering::Relaxed);
                data
            }
            None => {
                self.fresh.fetch_add(1, Ordering::Relaxed);
                vec![0u8; self.class_size].into_boxed_slice()
            }
        };
        let live = self.in_use.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_in_use.fetch_max(live, Ordering::Relaxed);
        data
    }

    fn give_back(&self, data: Box<[u8]>) {
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        // A full bucket sheds the block instead of growing without bound.
        let _ = self.free.push(data);
    }

    fn stats(&self) -> ClassStats {
        ClassStats {
            class_size: self.class_size,
            fresh_allocations: self.fresh.load(Ordering::Relaxed),
            reuses: self.reused.load(Ordering::Relaxed),
            in_use: self.in_use.load(Ordering::Relaxed),
            max_in_use: self.max_in_use.load(Ordering::Relaxed),
            free: self.free.len(),
        }
    }
}

/// State shared by the pool handle and every chunk it has issued.
pub(crate) struct PoolShared {
    classes: Vec<usize>,
    max_chunk_size: usize,
    buckets: Box<[Bucket]>,
    outstanding: AtomicUsize,
    peak: PeakTracker,
    oversize_allocations: AtomicU64,
    oversize_in_use: AtomicUsize,
    pub(crate) observer: Arc<dyn PoolObserver>,
}

impl PoolShared {
    fn new(config: PoolConfig, observer: Arc<dyn PoolObserver>) -> Self {
        let buckets = config
            .size_classes
            .iter()
            .map(|&class| Bucket::new(class, config.max_free_per_class))
            .collect();
        Self {
            classes: config.size_classes,
            max_chunk_size: config.max_chunk_size,
            buckets,
            outstanding: AtomicUsize::new(0),
            peak: PeakTracker::new(),
            oversize_allocations: AtomicU64::new(0),
            oversize_in_use: AtomicUsize::new(0),
            observer,
        }
    }

    /// Index of the smallest class ≥ `size`.
    fn class_index(&self, size: usize) -> Option<usize> {
        let idx = self.classes.partition_point(|&class| class < size);
        (idx < self.classes.len()).then_some(idx)
    }

    pub(crate) fn acquire(self: &Arc<Self>, size: usize) -> Chunk {
        if size == 0 {
            return Chunk::empty();
        }

        if size > self.max_chunk_size {
            let data = vec![0u8; size].into_boxed_slice();
            self.oversize_allocations.fetch_add(1, Ordering::Relaxed);
            self.oversize_in_use.fetch_add(1, Ordering::Relaxed);
            self.charge(size);
            self.observer.on_acquire(size, size);
            #[cfg(feature = "tracing")]
            tracing::trace!(size, "oversize chunk allocated outside the pool");
            return Chunk::new(data, Origin::Oversize, Arc::clone(self));
        }

        let Some(idx) = self.class_index(size) else {
            // The table is validated at build time, so this is unreachable for
            // any pool built through `ChunkPoolBuilder`.
            panic!(
                "pool for chunk size {size} does not exist (largest class {:?})",
                self.classes.last()
            );
        };
        let bucket = &self.buckets[idx];
        let data = bucket.take();
        self.charge(bucket.class_size);
        self.observer.on_acquire(size, bucket.class_size);
        Chunk::new(data, Origin::Pooled(idx), Arc::clone(self))
    }

    /// Called exactly once per chunk, from `Chunk::drop`.
    pub(crate) fn recycle(&self, data: Box<[u8]>, origin: Origin) {
        match origin {
            Origin::Empty => {}
            Origin::Oversize => {
                let len = data.len();
                self.outstanding.fetch_sub(len, Ordering::AcqRel);
                self.oversize_in_use.fetch_sub(1, Ordering::Relaxed);
                self.observer.on_release(len);
                #[cfg(feature = "tracing")]
                tracing::trace!(size = len, "oversize chunk freed");
                drop(data);
            }
            Origin::Pooled(idx) => {
                let bucket = &self.buckets[idx];
                self.outstanding.fetch_sub(bucket.class_size, Ordering::AcqRel);
                self.observer.on_release(bucket.class_size);
                bucket.give_back(data);
            }
        }
    }

    fn charge(&self, bytes: usize) {
        let now = self.outstanding.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.peak.record_used(now);
    }
}

/// Builder for a [`ChunkPool`].
///
/// # Example
/// ```
/// use netmem_core::PoolConfig;
/// use netmem_mem::ChunkPoolBuilder;
///
/// let pool = ChunkPoolBuilder::new()
///     .config(PoolConfig::with_classes(vec![64, 128, 256, 512]))
///     .build()
///     .unwrap();
/// assert_eq!(pool.class_for(100), Some(128));
/// ```
pub struct ChunkPoolBuilder {
    config: PoolConfig,
    observer: Arc<dyn PoolObserver>,
}

impl Default for ChunkPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkPoolBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs an observer (for example the `census` feature's `Census`).
    pub fn observer(mut self, observer: Arc<dyn PoolObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Validates the class table and builds the pool.
    pub fn build(self) -> Result<ChunkPool> {
        self.config.validate()?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            classes = ?self.config.size_classes,
            max_chunk_size = self.config.max_chunk_size,
            max_free_per_class = self.config.max_free_per_class,
            "chunk pool built"
        );
        Ok(ChunkPool {
            shared: Arc::new(PoolShared::new(self.config, self.observer)),
        })
    }
}

/// Handle to a chunk pool. Cloning is cheap and every clone shares the same
/// buckets and counters.
///
/// # Example
/// ```
/// use netmem_mem::ChunkPool;
///
/// let pool = ChunkPool::with_defaults();
/// let mut view = pool.view(100);
/// view.write(b"hello").unwrap();
/// assert_eq!(view.as_slice(), b"hello");
/// assert_eq!(pool.outstanding_bytes(), 128);
///
/// drop(view);
/// assert_eq!(pool.outstanding_bytes(), 0);
/// ```
#[derive(Clone)]
pub struct ChunkPool {
    shared: Arc<PoolShared>,
}

impl ChunkPool {
    pub fn builder() -> ChunkPoolBuilder {
        ChunkPoolBuilder::new()
    }

    /// Builds a pool from `config` with no observer.
    pub fn new(config: PoolConfig) -> Result<Self> {
        ChunkPoolBuilder::new().config(config).build()
    }

    /// Pool over the default class table (64 B … 64 KiB).
    pub fn with_defaults() -> Self {
        Self {
            shared: Arc::new(PoolShared::new(
                PoolConfig::default(),
                Arc::new(NoopObserver),
            )),
        }
    }

    pub(crate) fn from_shared(shared: Arc<PoolShared>) -> Self {
        Self { shared }
    }

    /// Hands out a chunk of at least `size` bytes with a reference count of 1.
    ///
    /// Never fails on exhaustion: an empty free list means a fresh allocation.
    pub fn acquire(&self, size: usize) -> Chunk {
        self.shared.acquire(size)
    }

    /// Class size that a request of `size` bytes is served from. `None` for 0
    /// and for sizes above `max_chunk_size`.
    pub fn class_for(&self, size: usize) -> Option<usize> {
        if size == 0 || size > self.shared.max_chunk_size {
            return None;
        }
        self.shared
            .class_index(size)
            .map(|idx| self.shared.classes[idx])
    }

    /// Empty view over a chunk of at least `capacity` bytes.
    pub fn view(&self, capacity: usize) -> View {
        View::new(self.acquire(capacity), None)
    }

    /// Like [`ChunkPool::view`], reporting `tag` to the pool observer on
    /// creation and release.
    pub fn view_with_tag(&self, tag: &'static str, capacity: usize) -> View {
        View::new(self.acquire(capacity), Some(tag))
    }

    /// View whose first `size` bytes are already counted as written (zeroed),
    /// ready to be filled in place.
    pub fn view_sized(&self, size: usize) -> View {
        let mut view = self.view(size);
        view.set_written(size);
        view
    }

    /// View holding a copy of `data`.
    pub fn view_from_slice(&self, data: &[u8]) -> View {
        let mut view = self.view(data.len());
        if let Some(dst) = view.unwritten_mut() {
            dst[..data.len()].copy_from_slice(data);
        }
        view.set_written(data.len());
        view
    }

    /// Fills a fresh view of `capacity` bytes through `fill`, which returns how
    /// many bytes it produced.
    ///
    /// If `fill` fails, the partially written view is released back to the
    /// pool before the error is returned.
    ///
    /// # Panics
    /// Panics if `fill` reports more bytes than the view can hold.
    pub fn view_from_fn<E>(
        &self,
        capacity: usize,
        fill: impl FnOnce(&mut [u8]) -> std::result::Result<usize, E>,
    ) -> std::result::Result<View, E> {
        let mut view = self.view(capacity);
        let produced = fill(view.unwritten_mut().unwrap_or_default());
        match produced {
            Ok(n) => {
                assert!(
                    n <= view.capacity(),
                    "fill reported {n} bytes for a view of capacity {}",
                    view.capacity()
                );
                view.set_written(n);
                Ok(view)
            }
            Err(e) => {
                view.release();
                Err(e)
            }
        }
    }

    /// Sum of class sizes (or exact lengths, for oversize chunks) of every
    /// chunk not yet released.
    pub fn outstanding_bytes(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    /// Best-effort high-water mark of [`ChunkPool::outstanding_bytes`].
    pub fn peak_outstanding_bytes(&self) -> usize {
        self.shared.peak.peak()
    }

    pub fn size_classes(&self) -> &[usize] {
        &self.shared.classes
    }

    pub fn max_chunk_size(&self) -> usize {
        self.shared.max_chunk_size
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            outstanding_bytes: self.outstanding_bytes(),
            peak_outstanding_bytes: self.peak_outstanding_bytes(),
            classes: self.shared.buckets.iter().map(Bucket::stats).collect(),
            oversize_allocations: self.shared.oversize_allocations.load(Ordering::Relaxed),
            oversize_in_use: self.shared.oversize_in_use.load(Ordering::Relaxed),
        }
    }
}

impl Default for ChunkPool {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ChunkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkPool")
            .field("classes", &self.shared.classes)
            .field("max_chunk_size", &self.shared.max_chunk_size)
            .field("outstanding_bytes", &self.outstanding_bytes())
            .finish_non_exhaustive()
    }
}
