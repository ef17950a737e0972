#![forbid(unsafe_code)]
//! netmem-mem: size-classed chunk pool, cursor views and view buffers.
//!
//! Every byte block on the data path is acquired here so outstanding memory is
//! accounted per size class and blocks are recycled instead of freed.
//!
//! Ownership model:
//!
//! ```text
//! ChunkPool::view(cap)
//!       │
//!       ▼
//!     View ──► Arc<Chunk> ──► Box<[u8]> (class-sized, zeroed on reuse)
//!       │            │
//!       │ share()    │ last owner dropped
//!       ▼            ▼
//!     View       bucket free list (or freed, if oversize)
//! ```
//!
//! A chunk goes back to its bucket exactly once, when the last view holding it
//! is dropped. There is no explicit decrement to call twice.

pub mod buffer;
pub mod chunk;
pub mod error;
pub mod leaky;
pub mod pool;
pub mod stats;
pub mod tracking;
pub mod view;

pub use buffer::Buffer;
pub use chunk::Chunk;
pub use error::{Error, Result};
pub use leaky::LeakyBuf;
pub use pool::{ChunkPool, ChunkPoolBuilder};
pub use stats::{ClassStats, PoolStats};
#[cfg(feature = "census")]
pub use tracking::{Census, CensusSnapshot, RequestedSize};
pub use tracking::PeakTracker;
pub use view::View;
