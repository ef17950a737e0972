//! Read-only pool statistics.
//!
//! [`PoolStats`] is a snapshot assembled from the pool's atomic counters. It
//! is never needed for correctness; it exists so operators can see which
//! classes are hot and whether recycling is working.

use serde::Serialize;

use crate::error::Result;

/// Counters for one size class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    pub class_size: usize,
    /// Blocks allocated because the free list was empty.
    pub fresh_allocations: u64,
    /// Blocks served from the free list.
    pub reuses: u64,
    /// Chunks of this class currently held by owners.
    pub in_use: usize,
    /// Highest `in_use` observed.
    pub max_in_use: usize,
    /// Blocks parked in the free list right now.
    pub free: usize,
}

/// Snapshot of a chunk pool.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    pub outstanding_bytes: usize,
    pub peak_outstanding_bytes: usize,
    pub classes: Vec<ClassStats>,
    pub oversize_allocations: u64,
    pub oversize_in_use: usize,
}

impl PoolStats {
    /// Fraction of pooled acquisitions served from a free list, in `[0.0, 1.0]`.
    ///
    /// Returns `0.0` if nothing has been acquired yet.
    pub fn reuse_ratio(&self) -> f64 {
        let (reused, total) = self.classes.iter().fold((0u64, 0u64), |(r, t), c| {
            (r + c.reuses, t + c.reuses + c.fresh_allocations)
        });
        if total == 0 {
            return 0.0;
        }
        reused as f64 / total as f64
    }

    pub fn class(&self, class_size: usize) -> Option<&ClassStats> {
        self.classes.iter().find(|c| c.class_size == class_size)
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let in_use: usize = self.classes.iter().map(|c| c.in_use).sum();
        format!(
            "outstanding {} bytes (peak {}), {} pooled chunks in use, {:.0}% reuse, \
             {} oversize in use ({} total)",
            self.outstanding_bytes,
            self.peak_outstanding_bytes,
            in_use,
            self.reuse_ratio() * 100.0,
            self.oversize_in_use,
            self.oversize_allocations,
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
