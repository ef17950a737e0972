//! Soft admission limit for counted list insertions.
//!
//! The limiter never rejects. A producer whose insertion pushes the count past
//! the limit is put to sleep for a short delay, so consumers get a chance to
//! drain. The sleep happens after the count is updated and the lock is
//! dropped; producers sharing a limiter never queue behind a sleeping one.

use std::thread;
use std::time::Duration;

use netmem_core::BackpressureConfig;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Counts {
    count: usize,
    max_count: usize,
}

/// Shared counter with a soft limit. A limit of 0 disables the delay.
#[derive(Debug)]
pub struct SoftLimiter {
    counts: Mutex<Counts>,
    soft_limit: usize,
    delay: Duration,
}

impl SoftLimiter {
    pub fn new(soft_limit: usize, delay: Duration) -> Self {
        Self {
            counts: Mutex::new(Counts::default()),
            soft_limit,
            delay,
        }
    }

    pub fn from_config(config: &BackpressureConfig) -> Self {
        Self::new(config.soft_limit, config.delay())
    }

    /// Counts without ever delaying.
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Counts `n` elements in and returns the new count.
    pub fn add(&self, n: usize) -> usize {
        let mut counts = self.counts.lock();
        counts.count += n;
        counts.max_count = counts.max_count.max(counts.count);
        counts.count
    }

    /// Counts one element in, then sleeps if the count is now over the limit.
    /// Returns whether the caller was delayed.
    pub fn admit(&self) -> bool {
        let snapshot = self.add(1);
        if self.soft_limit == 0 || snapshot <= self.soft_limit {
            return false;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            count = snapshot,
            soft_limit = self.soft_limit,
            delay_ms = self.delay.as_millis() as u64,
            "segment list over soft limit, delaying producer"
        );
        thread::sleep(self.delay);
        true
    }

    /// Counts `n` elements out. Never blocks beyond the counter lock.
    pub fn release(&self, n: usize) {
        let mut counts = self.counts.lock();
        debug_assert!(counts.count >= n, "released {n} of {} counted", counts.count);
        counts.count = counts.count.saturating_sub(n);
    }

    pub fn count(&self) -> usize {
        self.counts.lock().count
    }

    /// Highest count seen.
    pub fn max_count(&self) -> usize {
        self.counts.lock().max_count
    }

    pub fn soft_limit(&self) -> usize {
        self.soft_limit
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_over_limit(&self) -> bool {
        self.soft_limit != 0 && self.count() > self.soft_limit
    }
}

impl Default for SoftLimiter {
    fn default() -> Self {
        Self::from_config(&BackpressureConfig::default())
    }
}
