//! Soft-budgeted view issuance.
//!
//! `LeakyBuf` never refuses a request. It counts issuances inside the budget
//! (`total_num`) separately from those past it (`extra_num`), so pressure is
//! visible to whatever policy sits above it. Each issued view carries a
//! ticket; the matching put happens once, when the view is released by any
//! path.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use netmem_core::LeakyConfig;

use crate::pool::ChunkPool;
use crate::view::View;

#[derive(Debug)]
struct LeakyCounters {
    max_free_len: usize,
    total_num: AtomicUsize,
    extra_num: AtomicUsize,
    get_times: AtomicU64,
    put_times: AtomicU64,
}

impl LeakyCounters {
    fn issue(&self) {
        let in_budget = self
            .total_num
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_free_len).then_some(n + 1)
            })
            .is_ok();
        if !in_budget {
            self.extra_num.fetch_add(1, Ordering::AcqRel);
            #[cfg(feature = "tracing")]
            tracing::trace!(
                extra = self.extra_num.load(Ordering::Relaxed),
                max_free_len = self.max_free_len,
                "leaky issuance over budget"
            );
        }
        self.get_times.fetch_add(1, Ordering::AcqRel);
    }

    fn put(&self) {
        let dec = |n: usize| n.checked_sub(1);
        if self
            .extra_num
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, dec)
            .is_err()
        {
            let _ = self
                .total_num
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, dec);
        }
        self.put_times.fetch_add(1, Ordering::AcqRel);
    }
}

/// Proof that a view was issued by a [`LeakyBuf`]. Dropping it records the put.
#[derive(Debug)]
pub(crate) struct LeakyTicket {
    counters: Arc<LeakyCounters>,
}

impl Drop for LeakyTicket {
    fn drop(&mut self) {
        self.counters.put();
    }
}

/// Budgeted view issuer. Clones share one budget.
///
/// # Example
/// ```
/// use netmem_mem::{ChunkPool, LeakyBuf};
///
/// let leaky = LeakyBuf::new(ChunkPool::with_defaults(), 1);
/// let a = leaky.get(100);
/// let b = leaky.get(100);
/// assert_eq!((leaky.total_num(), leaky.extra_num()), (1, 1));
/// assert!(leaky.is_over_budget());
///
/// leaky.put(a);
/// drop(b);
/// assert_eq!(leaky.outstanding(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct LeakyBuf {
    pool: ChunkPool,
    counters: Arc<LeakyCounters>,
}

impl LeakyBuf {
    pub fn new(pool: ChunkPool, max_free_len: usize) -> Self {
        Self {
            pool,
            counters: Arc::new(LeakyCounters {
                max_free_len,
                total_num: AtomicUsize::new(0),
                extra_num: AtomicUsize::new(0),
                get_times: AtomicU64::new(0),
                put_times: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(pool: ChunkPool, config: &LeakyConfig) -> Self {
        Self::new(pool, config.max_free_len)
    }

    /// Issues a view of at least `capacity` bytes. Never blocks or refuses.
    pub fn get(&self, capacity: usize) -> View {
        self.counters.issue();
        let mut view = self.pool.view(capacity);
        view.ticket = Some(LeakyTicket {
            counters: Arc::clone(&self.counters),
        });
        view
    }

    /// Returns a view. A view that did not come from this issuer's budget is
    /// simply released; a ticketed one is credited back to its own budget.
    pub fn put(&self, view: View) {
        view.release();
    }

    /// `get_times - put_times`.
    pub fn outstanding(&self) -> u64 {
        let gets = self.counters.get_times.load(Ordering::Acquire);
        let puts = self.counters.put_times.load(Ordering::Acquire);
        gets.saturating_sub(puts)
    }

    pub fn total_num(&self) -> usize {
        self.counters.total_num.load(Ordering::Acquire)
    }

    pub fn extra_num(&self) -> usize {
        self.counters.extra_num.load(Ordering::Acquire)
    }

    pub fn get_times(&self) -> u64 {
        self.counters.get_times.load(Ordering::Acquire)
    }

    pub fn put_times(&self) -> u64 {
        self.counters.put_times.load(Ordering::Acquire)
    }

    pub fn max_free_len(&self) -> usize {
        self.counters.max_free_len
    }

    pub fn is_over_budget(&self) -> bool {
        self.extra_num() > 0
    }

    pub fn pool(&self) -> &ChunkPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_drains_before_total() {
        let leaky = LeakyBuf::new(ChunkPool::with_defaults(), 2);
        let views: Vec<View> = (0..5).map(|_| leaky.get(64)).collect();
        assert_eq!(leaky.total_num(), 2);
        assert_eq!(leaky.extra_num(), 3);
        assert_eq!(leaky.outstanding(), 5);

        let mut views = views.into_iter();
        for _ in 0..3 {
            leaky.put(views.next().unwrap());
        }
        assert_eq!(leaky.extra_num(), 0);
        assert_eq!(leaky.total_num(), 2);
        assert!(!leaky.is_over_budget());

        drop(views);
        assert_eq!(leaky.total_num(), 0);
        assert_eq!(leaky.put_times(), 5);
    }

    #[test]
    fn shared_view_does_not_double_put() {
        let leaky = LeakyBuf::new(ChunkPool::with_defaults(), 4);
        let v = leaky.get(10);
        let s = v.share();
        leaky.put(v);
        drop(s);
        assert_eq!(leaky.put_times(), 1);
        assert_eq!(leaky.outstanding(), 0);
    }

    #[test]
    fn untracked_view_leaves_counters_alone() {
        let pool = ChunkPool::with_defaults();
        let leaky = LeakyBuf::new(pool.clone(), 4);
        leaky.put(pool.view(10));
        assert_eq!(leaky.put_times(), 0);
        assert_eq!(pool.outstanding_bytes(), 0);
    }
}
