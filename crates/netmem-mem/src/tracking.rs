//! Lightweight peak and census tracking hooks.
//!
//! Keep this optional and cheap. The census only runs when it is installed as
//! the pool observer; periodic dumping is left to the embedding binary.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Best-effort high-water mark of outstanding bytes.
///
/// The maximum is updated with a compare-and-swap loop and no lock, so under
/// concurrency it may lag the true peak, but it never decreases.
#[derive(Debug, Default)]
pub struct PeakTracker {
    peak_bytes: AtomicUsize,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self {
            peak_bytes: AtomicUsize::new(0),
        }
    }

    /// Record a new "outstanding bytes" value; updates peak if higher.
    pub fn record_used(&self, used_bytes: usize) {
        let mut cur = self.peak_bytes.load(Ordering::Relaxed);
        while used_bytes > cur {
            match self.peak_bytes.compare_exchange(
                cur,
                used_bytes,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(used_bytes, previous = cur, "outstanding bytes peak");
                    break;
                }
                Err(observed) => cur = observed,
            }
        }
    }

    pub fn peak(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "census")]
pub use census::{Census, CensusSnapshot, RequestedSize};

#[cfg(feature = "census")]
mod census {
    use std::collections::BTreeMap;

    use netmem_core::PoolObserver;
    use parking_lot::Mutex;
    use serde::Serialize;

    use crate::error::Result;

    #[derive(Default)]
    struct CensusInner {
        in_use: BTreeMap<usize, usize>,
        max_in_use: BTreeMap<usize, usize>,
        allocations: BTreeMap<usize, u64>,
        requested: BTreeMap<usize, u64>,
        views: BTreeMap<&'static str, i64>,
    }

    /// Per-class and per-tag census, installed as a pool observer.
    #[derive(Default)]
    pub struct Census {
        inner: Mutex<CensusInner>,
    }

    impl Census {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn snapshot(&self) -> CensusSnapshot {
            let inner = self.inner.lock();
            CensusSnapshot {
                in_use: inner.in_use.clone(),
                max_in_use: inner.max_in_use.clone(),
                allocations: inner.allocations.clone(),
                requested: inner.requested.clone(),
                views: inner
                    .views
                    .iter()
                    .map(|(tag, n)| ((*tag).to_string(), *n))
                    .collect(),
            }
        }
    }

    impl PoolObserver for Census {
        fn on_acquire(&self, requested: usize, class_size: usize) {
            let mut inner = self.inner.lock();
            let live = {
                let n = inner.in_use.entry(class_size).or_insert(0);
                *n += 1;
                *n
            };
            let max = inner.max_in_use.entry(class_size).or_insert(0);
            *max = (*max).max(live);
            *inner.allocations.entry(class_size).or_insert(0) += 1;
            *inner.requested.entry(requested).or_insert(0) += 1;
        }

        fn on_release(&self, class_size: usize) {
            let mut inner = self.inner.lock();
            let n = inner.in_use.entry(class_size).or_insert(0);
            *n = n.saturating_sub(1);
        }

        fn on_view_created(&self, tag: &'static str) {
            *self.inner.lock().views.entry(tag).or_insert(0) += 1;
        }

        fn on_view_released(&self, tag: &'static str) {
            *self.inner.lock().views.entry(tag).or_insert(0) -= 1;
        }
    }

    /// Requested size and how often it was asked for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct RequestedSize {
        pub size: usize,
        pub count: u64,
    }

    /// Point-in-time copy of a [`Census`].
    #[derive(Debug, Clone, Default, Serialize)]
    pub struct CensusSnapshot {
        /// class size → chunks currently held.
        pub in_use: BTreeMap<usize, usize>,
        /// class size → highest `in_use` seen.
        pub max_in_use: BTreeMap<usize, usize>,
        /// class size → total acquisitions.
        pub allocations: BTreeMap<usize, u64>,
        /// requested size → total acquisitions.
        pub requested: BTreeMap<usize, u64>,
        /// view tag → live views.
        pub views: BTreeMap<String, i64>,
    }

    impl CensusSnapshot {
        /// Requested sizes ordered by `count × size`, largest first.
        pub fn top_requested(&self, n: usize) -> Vec<RequestedSize> {
            let mut sizes: Vec<RequestedSize> = self
                .requested
                .iter()
                .map(|(&size, &count)| RequestedSize { size, count })
                .collect();
            sizes.sort_by(|a, b| {
                let wa = a.count.saturating_mul(a.size as u64);
                let wb = b.count.saturating_mul(b.size as u64);
                wb.cmp(&wa).then(a.size.cmp(&b.size))
            });
            sizes.truncate(n);
            sizes
        }

        pub fn to_json(&self) -> Result<String> {
            Ok(serde_json::to_string(self)?)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn census_tracks_classes_and_tags() {
            let c = Census::new();
            c.on_acquire(100, 128);
            c.on_acquire(120, 128);
            c.on_acquire(10, 64);
            c.on_release(128);
            c.on_view_created("rx");
            c.on_view_created("rx");
            c.on_view_released("rx");

            let snap = c.snapshot();
            assert_eq!(snap.in_use[&128], 1);
            assert_eq!(snap.max_in_use[&128], 2);
            assert_eq!(snap.allocations[&64], 1);
            assert_eq!(snap.views["rx"], 1);
        }

        #[test]
        fn top_requested_orders_by_weight() {
            let c = Census::new();
            for _ in 0..3 {
                c.on_acquire(10, 64);
            }
            c.on_acquire(1000, 1024);
            let top = c.snapshot().top_requested(1);
            assert_eq!(top, vec![RequestedSize { size: 1000, count: 1 }]);
            assert!(c.snapshot().to_json().unwrap().contains("\"requested\""));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_never_decreases() {
        let p = PeakTracker::new();
        p.record_used(100);
        assert_eq!(p.peak(), 100);
        p.record_used(50);
        assert_eq!(p.peak(), 100);
        p.record_used(200);
        assert_eq!(p.peak(), 200);
    }
}
