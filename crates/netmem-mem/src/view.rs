//! Cursor pair over one chunk.
//!
//! A view's payload is `[read, write)` of its chunk. Capacity is the chunk's
//! length and never changes: producers size the view up front.
//!
//! Several views may share one chunk (`share`). While shared, the bytes are
//! read-only for every holder; mutating calls return
//! [`Error::SharedChunk`](crate::Error::SharedChunk) until the other holders
//! are gone. Deep copies go through `Clone`.

use std::io;
use std::sync::Arc;

use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::leaky::LeakyTicket;
use crate::pool::ChunkPool;

pub struct View {
    chunk: Arc<Chunk>,
    read: usize,
    write: usize,
    tag: Option<&'static str>,
    pub(crate) ticket: Option<LeakyTicket>,
}

impl View {
    pub(crate) fn new(chunk: Chunk, tag: Option<&'static str>) -> Self {
        Self::over(Arc::new(chunk), 0, 0, tag)
    }

    fn over(chunk: Arc<Chunk>, read: usize, write: usize, tag: Option<&'static str>) -> Self {
        if let (Some(tag), Some(observer)) = (tag, chunk.observer()) {
            observer.on_view_created(tag);
        }
        Self {
            chunk,
            read,
            write,
            tag,
            ticket: None,
        }
    }

    /// Valid payload length, `write - read`.
    pub fn size(&self) -> usize {
        self.write - self.read
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Fixed capacity (the chunk length).
    pub fn capacity(&self) -> usize {
        self.chunk.len()
    }

    /// Bytes still writable after `write`.
    pub fn available(&self) -> usize {
        self.capacity() - self.write
    }

    pub fn read_offset(&self) -> usize {
        self.read
    }

    pub fn write_offset(&self) -> usize {
        self.write
    }

    /// The `[read, write)` payload. No copy.
    pub fn as_slice(&self) -> &[u8] {
        &self.chunk.as_slice()[self.read..self.write]
    }

    /// Mutable payload. `None` while the chunk is shared.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        let (read, write) = (self.read, self.write);
        Arc::get_mut(&mut self.chunk).map(|c| &mut c.as_mut_slice()[read..write])
    }

    /// Spare capacity past `write`, for filling in place before [`View::grow`].
    /// `None` while the chunk is shared.
    pub fn unwritten_mut(&mut self) -> Option<&mut [u8]> {
        let write = self.write;
        Arc::get_mut(&mut self.chunk).map(|c| &mut c.as_mut_slice()[write..])
    }

    /// Appends `bytes` at the write cursor.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let available = self.available();
        if bytes.len() > available {
            return Err(Error::Capacity {
                requested: bytes.len(),
                available,
            });
        }
        let refs = self.ref_count();
        let write = self.write;
        let chunk = Arc::get_mut(&mut self.chunk).ok_or(Error::SharedChunk { refs })?;
        chunk.as_mut_slice()[write..write + bytes.len()].copy_from_slice(bytes);
        self.write += bytes.len();
        Ok(())
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    /// Advances `write` by `n` without touching the bytes, claiming space that
    /// was filled through [`View::unwritten_mut`].
    pub fn grow(&mut self, n: usize) -> Result<()> {
        let available = self.available();
        if n > available {
            return Err(Error::Capacity {
                requested: n,
                available,
            });
        }
        self.write += n;
        Ok(())
    }

    pub(crate) fn set_written(&mut self, n: usize) {
        debug_assert!(self.read + n <= self.capacity());
        self.write = self.read + n;
    }

    /// Consumes `n` bytes from the front of the payload.
    ///
    /// # Panics
    /// Panics if `n` exceeds [`View::size`].
    pub fn trim_front(&mut self, n: usize) {
        assert!(
            n <= self.size(),
            "trim_front({n}) past the end of a {}-byte view",
            self.size()
        );
        self.read += n;
    }

    /// Shortens the payload to `len` bytes. No-op if it is already shorter.
    pub fn truncate(&mut self, len: usize) {
        if len < self.size() {
            self.write = self.read + len;
        }
    }

    /// Empties the view so the whole capacity can be written again.
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Second view over the same chunk and payload. Both become read-only
    /// until one of them is released.
    pub fn share(&self) -> View {
        Self::over(Arc::clone(&self.chunk), self.read, self.write, self.tag)
    }

    /// Number of views holding this chunk.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.chunk)
    }

    pub fn is_shared(&self) -> bool {
        self.ref_count() > 1
    }

    pub fn tag(&self) -> Option<&'static str> {
        self.tag
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    /// Pool the backing chunk came from.
    pub fn pool(&self) -> Option<ChunkPool> {
        self.chunk.pool()
    }

    /// Gives the view up. The chunk returns to its pool once no other view
    /// shares it. Consuming `self` is what makes a second release impossible.
    pub fn release(self) {
        drop(self);
    }
}

impl Clone for View {
    /// Deep copy: a new chunk from the same pool with the same payload range.
    fn clone(&self) -> Self {
        let chunk = Arc::new((*self.chunk).clone());
        Self::over(chunk, self.read, self.write, self.tag)
    }
}

impl Drop for View {
    fn drop(&mut self) {
        if let (Some(tag), Some(observer)) = (self.tag, self.chunk.observer()) {
            observer.on_view_released(tag);
        }
    }
}

impl AsRef<[u8]> for View {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl io::Write for View {
    /// Writes as much of `buf` as fits; `Ok(0)` once the view is full.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.available());
        View::write(self, &buf[..n]).map_err(io::Error::other)?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("read", &self.read)
            .field("write", &self.write)
            .field("capacity", &self.capacity())
            .field("refs", &self.ref_count())
            .field("tag", &self.tag)
            .finish()
    }
}
