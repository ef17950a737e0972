#![forbid(unsafe_code)]
//! netmem-core: shared contracts for the netmem memory engine.
//!
//! Responsibilities:
//! - Configuration for the chunk pool, leaky issuance budgets and segment
//!   backpressure (serde + environment overlay).
//! - The observer hook the pool reports through (no-op by default).
//! - [`List`], the arena-backed doubly linked list that both view buffers and
//!   segment queues are built on.
//!
//! **No allocation policy and no threading** here. `netmem-mem` owns the pool.

pub mod config;
pub mod error;
pub mod list;
pub mod observer;
pub mod prelude;

pub use config::{BackpressureConfig, LeakyConfig, NetmemConfig, PoolConfig};
pub use error::{Error, Result};
pub use list::{Handle, List};
pub use observer::{NoopObserver, PoolObserver};
