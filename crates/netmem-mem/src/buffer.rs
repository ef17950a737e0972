//! Ordered sequence of views forming one logical byte stream.
//!
//! The buffer owns its views and keeps the total payload length cached, so
//! `size()` is O(1). Views are not mutable in place through the buffer; the
//! only in-place edit is [`Buffer::trim_front`], which keeps the cache
//! in step.

use netmem_core::{Handle, List};

use crate::pool::ChunkPool;
use crate::view::View;

#[derive(Default)]
pub struct Buffer {
    views: List<View>,
    size: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total payload bytes across all views.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn push_back(&mut self, view: View) -> Handle {
        self.size += view.size();
        self.views.push_back(view)
    }

    pub fn push_front(&mut self, view: View) -> Handle {
        self.size += view.size();
        self.views.push_front(view)
    }

    pub fn front(&self) -> Option<&View> {
        self.views.front_value()
    }

    pub fn back(&self) -> Option<&View> {
        self.views.back_value()
    }

    pub fn front_handle(&self) -> Option<Handle> {
        self.views.front()
    }

    pub fn back_handle(&self) -> Option<Handle> {
        self.views.back()
    }

    pub fn get(&self, handle: Handle) -> Option<&View> {
        self.views.get(handle)
    }

    /// Detaches a view and hands it back to the caller.
    ///
    /// # Panics
    /// Panics if `handle` does not name a view in this buffer.
    pub fn remove(&mut self, handle: Handle) -> View {
        let view = self.views.remove(handle);
        self.size -= view.size();
        view
    }

    pub fn pop_front(&mut self) -> Option<View> {
        let view = self.views.pop_front()?;
        self.size -= view.size();
        Some(view)
    }

    pub fn pop_back(&mut self) -> Option<View> {
        let view = self.views.pop_back()?;
        self.size -= view.size();
        Some(view)
    }

    /// Moves every view of `other` to the back of `self`, leaving `other`
    /// empty. No view is moved or copied, and handles taken from `other`
    /// name the same views in `self`.
    pub fn push_back_list(&mut self, other: &mut Buffer) {
        self.size += std::mem::take(&mut other.size);
        self.views.push_back_list(&mut other.views);
    }

    /// Moves every view of `other` to the front of `self`, leaving `other`
    /// empty.
    pub fn push_front_list(&mut self, other: &mut Buffer) {
        self.size += std::mem::take(&mut other.size);
        self.views.push_front_list(&mut other.views);
    }

    /// Calls `f` with the slices covering `[offset, offset + length)` of the
    /// stream, in order and without copying. Views before `offset` are
    /// skipped, the walk stops as soon as `length` bytes were delivered, and
    /// `f` never sees an empty slice. Nothing is delivered past the end.
    ///
    /// # Example
    /// ```
    /// use netmem_mem::{Buffer, ChunkPool};
    ///
    /// let pool = ChunkPool::with_defaults();
    /// let mut buf = Buffer::new();
    /// buf.push_back(pool.view_from_slice(b"hello "));
    /// buf.push_back(pool.view_from_slice(b"world"));
    ///
    /// let mut parts = Vec::new();
    /// buf.for_each_byte_range(4, 4, |s| parts.push(s.to_vec()));
    /// assert_eq!(parts, vec![b"o ".to_vec(), b"wo".to_vec()]);
    /// ```
    pub fn for_each_byte_range(&self, offset: usize, length: usize, mut f: impl FnMut(&[u8])) {
        let mut offset = offset;
        let mut remaining = length;
        for view in self.views.iter() {
            if remaining == 0 {
                break;
            }
            let bytes = view.as_slice();
            if offset >= bytes.len() {
                offset -= bytes.len();
                continue;
            }
            let take = (bytes.len() - offset).min(remaining);
            f(&bytes[offset..offset + take]);
            remaining -= take;
            offset = 0;
        }
    }

    /// Consumes up to `n` bytes from the front and returns how many were
    /// consumed. Fully consumed views are released back to their pool; a
    /// partially consumed one has its read cursor advanced. No empty view is
    /// left at the front afterwards.
    pub fn trim_front(&mut self, n: usize) -> usize {
        let trimmed = n.min(self.size);
        let mut left = trimmed;
        while let Some(h) = self.views.front() {
            let Some(view) = self.views.get_mut(h) else {
                break;
            };
            let size = view.size();
            if size <= left {
                left -= size;
                self.views.pop_front();
            } else {
                view.trim_front(left);
                break;
            }
        }
        self.size -= trimmed;
        trimmed
    }

    /// Copies bytes starting at `offset` into `dst`; returns the count copied.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        let len = dst.len();
        self.for_each_byte_range(offset, len, |s| {
            dst[copied..copied + s.len()].copy_from_slice(s);
            copied += s.len();
        });
        copied
    }

    /// Flattens the stream into one vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        self.for_each_byte_range(0, self.size, |s| out.extend_from_slice(s));
        out
    }

    /// Appends `data`: first into the spare capacity of the tail view (when it
    /// is not shared), then into new views from `pool` of at most
    /// `pool.max_chunk_size()` bytes each.
    pub fn append(&mut self, pool: &ChunkPool, data: &[u8]) {
        let mut rest = data;
        if let Some(h) = self.views.back() {
            if let Some(tail) = self.views.get_mut(h) {
                if let Some(spare) = tail.unwritten_mut() {
                    let n = spare.len().min(rest.len());
                    spare[..n].copy_from_slice(&rest[..n]);
                    if tail.grow(n).is_ok() {
                        self.size += n;
                        rest = &rest[n..];
                    }
                }
            }
        }
        let step = pool.max_chunk_size().max(1);
        for piece in rest.chunks(step) {
            self.push_back(pool.view_from_slice(piece));
        }
    }

    /// Releases every view.
    pub fn clear(&mut self) {
        self.views.reset();
        self.size = 0;
    }

    /// Views front to back.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &View> + '_ {
        self.views.iter()
    }

    pub fn links_consistent(&self) -> bool {
        self.views.links_consistent()
            && self.views.iter().map(View::size).sum::<usize>() == self.size
    }
}

impl Extend<View> for Buffer {
    fn extend<I: IntoIterator<Item = View>>(&mut self, iter: I) {
        for view in iter {
            self.push_back(view);
        }
    }
}

impl FromIterator<View> for Buffer {
    fn from_iter<I: IntoIterator<Item = View>>(iter: I) -> Self {
        let mut buf = Self::new();
        buf.extend(iter);
        buf
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.size)
            .field("views", &self.views.len())
            .finish()
    }
}
