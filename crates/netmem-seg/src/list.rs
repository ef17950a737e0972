//! Doubly linked list whose counted elements feed a shared [`SoftLimiter`].
//!
//! Whether an element is counted is decided by [`Countable::counted`] when it
//! is inserted and remembered with the element, so later mutation cannot make
//! the list release a count it never took.
//!
//! Every insertion path counts. Only `push_back` (the producer path) may be
//! delayed. Every removal path, dropping the list included, releases.

use std::sync::Arc;

use netmem_core::{Handle, List};

use crate::backpressure::SoftLimiter;

/// Opt-in for backpressure accounting.
pub trait Countable {
    fn counted(&self) -> bool {
        false
    }
}

#[derive(Debug)]
struct Entry<T> {
    value: T,
    counted: bool,
}

pub struct CountedList<T: Countable> {
    list: List<Entry<T>>,
    limiter: Option<Arc<SoftLimiter>>,
    counted: usize,
}

impl<T: Countable> Default for CountedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Countable> CountedList<T> {
    /// List with no shared limiter; counted elements are only tallied locally.
    pub fn new() -> Self {
        Self {
            list: List::new(),
            limiter: None,
            counted: 0,
        }
    }

    pub fn with_limiter(limiter: Arc<SoftLimiter>) -> Self {
        Self {
            list: List::new(),
            limiter: Some(limiter),
            counted: 0,
        }
    }

    pub fn limiter(&self) -> Option<&Arc<SoftLimiter>> {
        self.limiter.as_ref()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Elements currently holding a count.
    pub fn counted_len(&self) -> usize {
        self.counted
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn front(&self) -> Option<Handle> {
        self.list.front()
    }

    pub fn back(&self) -> Option<Handle> {
        self.list.back()
    }

    pub fn front_value(&self) -> Option<&T> {
        self.list.front_value().map(|e| &e.value)
    }

    pub fn back_value(&self) -> Option<&T> {
        self.list.back_value().map(|e| &e.value)
    }

    pub fn next(&self, handle: Handle) -> Option<Handle> {
        self.list.next(handle)
    }

    pub fn prev(&self, handle: Handle) -> Option<Handle> {
        self.list.prev(handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.list.contains(handle)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.list.get(handle).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.list.get_mut(handle).map(|e| &mut e.value)
    }

    /// Appends `value`. If it is counted and the shared count ends up over
    /// the soft limit, the caller sleeps before this returns.
    pub fn push_back(&mut self, value: T) -> Handle {
        let counted = value.counted();
        let handle = self.list.push_back(Entry { value, counted });
        if counted {
            self.counted += 1;
            if let Some(limiter) = &self.limiter {
                limiter.admit();
            }
        }
        handle
    }

    pub fn push_front(&mut self, value: T) -> Handle {
        let entry = self.count_in(value);
        self.list.push_front(entry)
    }

    /// # Panics
    /// Panics if `at` is not an element of this list.
    pub fn insert_before(&mut self, at: Handle, value: T) -> Handle {
        assert!(self.list.contains(at), "insert_before: {at} is not an element of this list");
        let entry = self.count_in(value);
        self.list.insert_before(at, entry)
    }

    /// # Panics
    /// Panics if `at` is not an element of this list.
    pub fn insert_after(&mut self, at: Handle, value: T) -> Handle {
        assert!(self.list.contains(at), "insert_after: {at} is not an element of this list");
        let entry = self.count_in(value);
        self.list.insert_after(at, entry)
    }

    /// # Panics
    /// Panics if `handle` is not an element of this list.
    pub fn remove(&mut self, handle: Handle) -> T {
        let entry = self.list.remove(handle);
        self.count_out(entry)
    }

    pub fn try_remove(&mut self, handle: Handle) -> Option<T> {
        let entry = self.list.try_remove(handle)?;
        Some(self.count_out(entry))
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let entry = self.list.pop_front()?;
        Some(self.count_out(entry))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let entry = self.list.pop_back()?;
        Some(self.count_out(entry))
    }

    /// Moves every element of `other` to the back of `self` without copying
    /// them; handles from both lists stay valid in `self`. Counts move with
    /// them when the two lists use different limiters. Never delays.
    pub fn push_back_list(&mut self, other: &mut CountedList<T>) {
        self.take_counts(other);
        self.list.push_back_list(&mut other.list);
    }

    /// Moves every element of `other` to the front of `self`.
    pub fn push_front_list(&mut self, other: &mut CountedList<T>) {
        self.take_counts(other);
        self.list.push_front_list(&mut other.list);
    }

    /// Drops every element, releasing their counts.
    pub fn reset(&mut self) {
        self.release_all();
        self.list.reset();
    }

    /// Values front to back.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> + '_ {
        self.list.iter().map(|e| &e.value)
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.list.handles()
    }

    pub fn links_consistent(&self) -> bool {
        self.list.links_consistent()
            && self.list.iter().filter(|e| e.counted).count() == self.counted
    }

    fn count_in(&mut self, value: T) -> Entry<T> {
        let counted = value.counted();
        if counted {
            self.counted += 1;
            if let Some(limiter) = &self.limiter {
                limiter.add(1);
            }
        }
        Entry { value, counted }
    }

    fn count_out(&mut self, entry: Entry<T>) -> T {
        if entry.counted {
            self.counted -= 1;
            if let Some(limiter) = &self.limiter {
                limiter.release(1);
            }
        }
        entry.value
    }

    fn take_counts(&mut self, other: &mut CountedList<T>) {
        let moved = std::mem::take(&mut other.counted);
        self.counted += moved;
        if moved == 0 || same_limiter(&self.limiter, &other.limiter) {
            return;
        }
        if let Some(limiter) = &other.limiter {
            limiter.release(moved);
        }
        if let Some(limiter) = &self.limiter {
            limiter.add(moved);
        }
    }

    fn release_all(&mut self) {
        let n = std::mem::take(&mut self.counted);
        if n > 0 {
            if let Some(limiter) = &self.limiter {
                limiter.release(n);
            }
        }
    }
}

fn same_limiter(a: &Option<Arc<SoftLimiter>>, b: &Option<Arc<SoftLimiter>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl<T: Countable> Drop for CountedList<T> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<T: Countable + std::fmt::Debug> std::fmt::Debug for CountedList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
