//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest chunk size served from a pool bucket. Larger requests are
/// allocated directly and freed on release.
pub const MAX_CHUNK_SIZE: usize = 65536;

/// Default size-class table. 1500 sits between 1024 and 2048 so a full
/// Ethernet frame payload does not pay for a 2 KiB block.
pub const DEFAULT_SIZE_CLASSES: [usize; 12] = [
    64, 128, 256, 512, 1024, 1500, 2048, 4096, 8192, 16384, 32768, 65536,
];

/// Chunk pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Ascending table of class sizes (bytes).
    pub size_classes: Vec<usize>,

    /// Requests above this size bypass the buckets.
    pub max_chunk_size: usize,

    /// Upper bound on recycled blocks retained per class. Blocks released into
    /// a full bucket are freed instead.
    pub max_free_per_class: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size_classes: DEFAULT_SIZE_CLASSES.to_vec(),
            max_chunk_size: MAX_CHUNK_SIZE,
            max_free_per_class: 4096,
        }
    }
}

impl PoolConfig {
    /// Configuration with a custom class table whose largest class is also the
    /// pooling ceiling.
    pub fn with_classes(size_classes: impl Into<Vec<usize>>) -> Self {
        let size_classes = size_classes.into();
        let max_chunk_size = size_classes.last().copied().unwrap_or(0);
        Self {
            size_classes,
            max_chunk_size,
            ..Self::default()
        }
    }

    /// Checks that every size in `1..=max_chunk_size` maps to a class.
    pub fn validate(&self) -> Result<()> {
        if self.size_classes.is_empty() {
            return Err(Error::Config("size class table is empty".into()));
        }
        if self.size_classes[0] == 0 {
            return Err(Error::Config("size classes must be non-zero".into()));
        }
        if let Some(w) = self.size_classes.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::Config(format!(
                "size classes must be strictly ascending ({} is followed by {})",
                w[0], w[1]
            )));
        }
        let largest = self.size_classes[self.size_classes.len() - 1];
        if largest < self.max_chunk_size {
            return Err(Error::Config(format!(
                "largest size class {largest} is below max_chunk_size {}",
                self.max_chunk_size
            )));
        }
        if self.max_free_per_class == 0 {
            return Err(Error::Config("max_free_per_class must be positive".into()));
        }
        Ok(())
    }
}

/// Budget for a leaky issuance tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeakyConfig {
    /// Number of in-budget issuances before views count as extra.
    pub max_free_len: usize,
}

impl Default for LeakyConfig {
    fn default() -> Self {
        Self { max_free_len: 1024 }
    }
}

/// Soft limit applied to counted segment-list insertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackpressureConfig {
    /// Counted elements allowed before producers are delayed. 0 disables it.
    pub soft_limit: usize,

    /// Delay applied to an insertion that lands above the limit.
    pub delay_ms: u64,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            soft_limit: 0,
            delay_ms: 30,
        }
    }
}

impl BackpressureConfig {
    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetmemConfig {
    pub pool: PoolConfig,
    pub leaky: LeakyConfig,
    pub backpressure: BackpressureConfig,
}

impl NetmemConfig {
    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.pool.validate()?;
        Ok(cfg)
    }

    /// Build a config from environment variables, falling back to defaults.
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("NETMEM_SIZE_CLASSES") {
            if let Some(classes) = parse_class_list(&s) {
                cfg.pool.max_chunk_size = classes[classes.len() - 1];
                cfg.pool.size_classes = classes;
            }
        }

        if let Ok(s) = std::env::var("NETMEM_MAX_CHUNK_SIZE") {
            if let Ok(v) = s.trim().parse::<usize>() {
                cfg.pool.max_chunk_size = v;
            }
        }

        if let Ok(s) = std::env::var("NETMEM_MAX_FREE_PER_CLASS") {
            if let Ok(v) = s.trim().parse::<usize>() {
                cfg.pool.max_free_per_class = v;
            }
        }

        if let Ok(s) = std::env::var("NETMEM_LEAKY_MAX_FREE") {
            if let Ok(v) = s.trim().parse::<usize>() {
                cfg.leaky.max_free_len = v;
            }
        }

        if let Ok(s) = std::env::var("NETMEM_SEGMENT_SOFT_LIMIT") {
            if let Ok(v) = s.trim().parse::<usize>() {
                cfg.backpressure.soft_limit = v;
            }
        }

        if let Ok(s) = std::env::var("NETMEM_SEGMENT_DELAY_MS") {
            if let Ok(v) = s.trim().parse::<u64>() {
                cfg.backpressure.delay_ms = v;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            classes = cfg.pool.size_classes.len(),
            max_chunk_size = cfg.pool.max_chunk_size,
            soft_limit = cfg.backpressure.soft_limit,
            "loaded netmem config from env"
        );

        cfg
    }
}

fn parse_class_list(s: &str) -> Option<Vec<usize>> {
    let classes = s
        .split(',')
        .map(|part| part.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .ok()?;
    if classes.is_empty() {
        None
    } else {
        Some(classes)
    }
}
