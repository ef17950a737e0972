#![forbid(unsafe_code)]
//! netmem: zero-copy buffer memory for a user-space network stack.
//!
//! - [`mem`]: size-classed chunk pool, views, view buffers, leaky issuance.
//! - [`seg`]: backpressure-aware lists and TCP segment queues.
//! - [`common`]: configuration, the observer hook and the arena list.

pub use netmem_core as common;
pub use netmem_mem as mem;
pub use netmem_seg as seg;

pub use netmem_core::{NetmemConfig, PoolConfig};
pub use netmem_mem::{Buffer, Chunk, ChunkPool, LeakyBuf, View};
pub use netmem_seg::{Countable, CountedList, Segment, SegmentQueue, SoftLimiter};

/// Everything needed to stand up the engine from one config.
#[derive(Debug, Clone)]
pub struct Engine {
    pub pool: ChunkPool,
    pub leaky: LeakyBuf,
    pub limiter: std::sync::Arc<SoftLimiter>,
}

impl Engine {
    pub fn new(config: &NetmemConfig) -> netmem_mem::Result<Self> {
        let pool = ChunkPool::new(config.pool.clone())?;
        let leaky = LeakyBuf::from_config(pool.clone(), &config.leaky);
        let limiter = std::sync::Arc::new(SoftLimiter::from_config(&config.backpressure));
        Ok(Self {
            pool,
            leaky,
            limiter,
        })
    }

    /// Builds from `NETMEM_*` environment variables.
    pub fn from_env() -> netmem_mem::Result<Self> {
        Self::new(&NetmemConfig::from_env())
    }

    /// Segment queue sharing this engine's limiter.
    pub fn segment_queue(&self) -> SegmentQueue {
        SegmentQueue::with_limiter(std::sync::Arc::clone(&self.limiter))
    }
}
