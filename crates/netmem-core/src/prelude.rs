//! Convenient re-exports for downstream crates.

pub use crate::config::{BackpressureConfig, LeakyConfig, NetmemConfig, PoolConfig};
pub use crate::error::{Error, Result};
pub use crate::list::{Handle, List};
pub use crate::observer::{NoopObserver, PoolObserver};
