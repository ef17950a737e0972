//! Fixed-size memory block on loan from a [`ChunkPool`](crate::ChunkPool).
//!
//! A chunk knows where it came from and returns its block there when dropped.
//! Shared ownership is layered on top by [`View`](crate::View), which holds
//! chunks behind `Arc`; the last owner's drop is the one release.

use std::sync::Arc;

use netmem_core::PoolObserver;

use crate::pool::{ChunkPool, PoolShared};

/// Where a chunk's block goes on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Zero-length chunk with no backing block.
    Empty,
    /// Index into the pool's class table.
    Pooled(usize),
    /// Exact-length block above `max_chunk_size`.
    Oversize,
}

pub struct Chunk {
    data: Box<[u8]>,
    origin: Origin,
    pool: Option<Arc<PoolShared>>,
}

impl Chunk {
    pub(crate) fn new(data: Box<[u8]>, origin: Origin, pool: Arc<PoolShared>) -> Self {
        Self {
            data,
            origin,
            pool: Some(pool),
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            data: Box::default(),
            origin: Origin::Empty,
            pool: None,
        }
    }

    /// Usable bytes: the class size for pooled chunks, the request for
    /// oversize ones.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// True if the block will be returned to a bucket on release.
    pub fn is_pooled(&self) -> bool {
        matches!(self.origin, Origin::Pooled(_))
    }

    /// Class size for pooled chunks, `None` otherwise.
    pub fn class_size(&self) -> Option<usize> {
        self.is_pooled().then_some(self.data.len())
    }

    /// Pool this chunk was issued by. `None` for the empty chunk.
    pub fn pool(&self) -> Option<ChunkPool> {
        self.pool.as_ref().map(|p| ChunkPool::from_shared(Arc::clone(p)))
    }

    pub(crate) fn observer(&self) -> Option<&dyn PoolObserver> {
        self.pool.as_deref().map(|p| &*p.observer)
    }
}

impl Clone for Chunk {
    /// Copies into a new block drawn from the same pool.
    fn clone(&self) -> Self {
        match &self.pool {
            Some(pool) => {
                let mut copy = pool.acquire(self.data.len());
                copy.data.copy_from_slice(&self.data);
                copy
            }
            None => Chunk::empty(),
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.recycle(std::mem::take(&mut self.data), self.origin);
        }
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("len", &self.data.len())
            .field("origin", &self.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use netmem_core::PoolConfig;

    use crate::ChunkPool;

    #[test]
    fn clone_copies_into_a_new_block() {
        let pool = ChunkPool::new(PoolConfig::with_classes(vec![64, 128])).unwrap();
        let mut a = pool.acquire(100);
        a.as_mut_slice()[..3].copy_from_slice(b"xyz");
        let b = a.clone();
        assert_eq!(&b.as_slice()[..3], b"xyz");
        assert_eq!(b.class_size(), Some(128));
        assert_eq!(pool.outstanding_bytes(), 256);
        drop(a);
        drop(b);
        assert_eq!(pool.outstanding_bytes(), 0);
    }

    #[test]
    fn empty_chunk_has_no_pool() {
        let pool = ChunkPool::with_defaults();
        let c = pool.acquire(0);
        assert!(c.pool().is_none());
        assert_eq!(c.class_size(), None);
        assert!(c.clone().is_empty());
    }
}
