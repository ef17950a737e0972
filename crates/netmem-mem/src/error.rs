use thiserror::Error;

/// Result type local to netmem-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("view capacity exceeded: requested {requested} bytes, {available} available")]
    Capacity { requested: usize, available: usize },

    #[error("chunk is shared by {refs} views; clone the view before mutating it")]
    SharedChunk { refs: usize },

    #[error(transparent)]
    Core(#[from] netmem_core::Error),

    #[error("stats serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
