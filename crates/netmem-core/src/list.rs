//! Arena-backed doubly linked list with stable handles.
//!
//! Elements live in slot arenas together with their `prev`/`next` links, so
//! insertion and removal never allocate a separate node once a slot is free,
//! and every edge operation is O(1). Neighbours are referenced by
//! `(arena, slot)`, not by address.
//!
//! Every arena carries a process-wide unique id, and a [`Handle`] records the
//! arena id and slot generation. A handle from another list, or one that
//! outlived its element, therefore never resolves to an unrelated element.
//!
//! Splicing adopts the source's arenas wholesale instead of moving elements:
//! the cost is one map insert per arena the source owns (one, unless the
//! source was itself spliced into), independent of its length. Handles into
//! the source keep resolving in the destination. An adopted arena is dropped
//! once its last element is removed; new elements always go into the list's
//! own arena.
//!
//! Invariants (checked by [`List::links_consistent`]):
//! - for every element `e` with a successor `n`, `n.prev == e` (and
//!   symmetrically for predecessors);
//! - `head` and `tail` are `None` exactly when the list is empty.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

/// Stable reference to an element of a [`List`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    arena: u32,
    index: u32,
    generation: u32,
}

impl Handle {
    /// Slot index within its arena (diagnostics only).
    pub const fn index(self) -> usize {
        self.index as usize
    }

    const fn link(self) -> Link {
        Link {
            arena: self.arena,
            index: self.index,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}:{}#{})", self.arena, self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Link {
    arena: u32,
    index: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<Link>,
    next: Option<Link>,
}

#[derive(Debug)]
struct Entry<T> {
    value: T,
    links: Links,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

struct Arena<T> {
    id: u32,
    slots: Vec<Slot<T>>,
    vacant: Vec<u32>,
    live: usize,
}

impl<T> Arena<T> {
    fn with_capacity(cap: usize) -> Self {
        Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::with_capacity(cap),
            vacant: Vec::new(),
            live: 0,
        }
    }
}

/// Doubly linked list over internal arenas.
pub struct List<T> {
    home: Arena<T>,
    adopted: HashMap<u32, Arena<T>>,
    head: Option<Link>,
    tail: Option<Link>,
    len: usize,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> List<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-allocates room for `cap` elements.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            home: Arena::with_capacity(cap),
            adopted: HashMap::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn front(&self) -> Option<Handle> {
        self.head.map(|at| self.handle_at(at))
    }

    pub fn back(&self) -> Option<Handle> {
        self.tail.map(|at| self.handle_at(at))
    }

    pub fn front_value(&self) -> Option<&T> {
        self.head.map(|at| &self.entry(at).value)
    }

    pub fn back_value(&self) -> Option<&T> {
        self.tail.map(|at| &self.entry(at).value)
    }

    /// Returns `true` if `handle` refers to a live element of this list.
    pub fn contains(&self, handle: Handle) -> bool {
        self.live_link(handle).is_some()
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let at = self.live_link(handle)?;
        Some(&self.entry(at).value)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let at = self.live_link(handle)?;
        Some(&mut self.entry_mut(at).value)
    }

    /// Element following `handle`, if any.
    pub fn next(&self, handle: Handle) -> Option<Handle> {
        let at = self.live_link(handle)?;
        self.entry(at).links.next.map(|n| self.handle_at(n))
    }

    /// Element preceding `handle`, if any.
    pub fn prev(&self, handle: Handle) -> Option<Handle> {
        let at = self.live_link(handle)?;
        self.entry(at).links.prev.map(|p| self.handle_at(p))
    }

    pub fn push_front(&mut self, value: T) -> Handle {
        let old_head = self.head;
        let at = self.occupy(value, Links { prev: None, next: old_head });
        match old_head {
            Some(h) => self.entry_mut(h).links.prev = Some(at),
            None => self.tail = Some(at),
        }
        self.head = Some(at);
        self.handle_at(at)
    }

    pub fn push_back(&mut self, value: T) -> Handle {
        let old_tail = self.tail;
        let at = self.occupy(value, Links { prev: old_tail, next: None });
        match old_tail {
            Some(t) => self.entry_mut(t).links.next = Some(at),
            None => self.head = Some(at),
        }
        self.tail = Some(at);
        self.handle_at(at)
    }

    /// Inserts `value` immediately before `at`.
    ///
    /// # Panics
    /// Panics if `at` is not an element of this list.
    pub fn insert_before(&mut self, at: Handle, value: T) -> Handle {
        let a = self.expect_live(at, "insert_before");
        let before = self.entry(a).links.prev;
        let new = self.occupy(value, Links { prev: before, next: Some(a) });
        self.entry_mut(a).links.prev = Some(new);
        match before {
            Some(b) => self.entry_mut(b).links.next = Some(new),
            None => self.head = Some(new),
        }
        self.handle_at(new)
    }

    /// Inserts `value` immediately after `at`.
    ///
    /// # Panics
    /// Panics if `at` is not an element of this list.
    pub fn insert_after(&mut self, at: Handle, value: T) -> Handle {
        let b = self.expect_live(at, "insert_after");
        let after = self.entry(b).links.next;
        let new = self.occupy(value, Links { prev: Some(b), next: after });
        self.entry_mut(b).links.next = Some(new);
        match after {
            Some(a) => self.entry_mut(a).links.prev = Some(new),
            None => self.tail = Some(new),
        }
        self.handle_at(new)
    }

    /// Unlinks and returns the element behind `handle`.
    ///
    /// # Panics
    /// Panics if `handle` is not an element of this list. Removing an element
    /// that is not present is a caller bug; use [`List::try_remove`] when the
    /// handle may be stale.
    pub fn remove(&mut self, handle: Handle) -> T {
        let at = self.expect_live(handle, "remove");
        self.unlink(at)
    }

    pub fn try_remove(&mut self, handle: Handle) -> Option<T> {
        let at = self.live_link(handle)?;
        Some(self.unlink(at))
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let at = self.head?;
        Some(self.unlink(at))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let at = self.tail?;
        Some(self.unlink(at))
    }

    /// Appends every element of `other` to the end of `self`, emptying
    /// `other`. No element moves: `self` adopts `other`'s arenas, so handles
    /// issued by either list resolve in `self` afterwards.
    pub fn push_back_list(&mut self, other: &mut List<T>) {
        let Some((head, tail, len)) = self.adopt(other) else {
            return;
        };
        match self.tail {
            Some(t) => {
                self.entry_mut(t).links.next = Some(head);
                self.entry_mut(head).links.prev = Some(t);
            }
            None => self.head = Some(head),
        }
        self.tail = Some(tail);
        self.len += len;
    }

    /// Prepends every element of `other` to the front of `self`, emptying
    /// `other`. Same cost and handle rules as [`List::push_back_list`].
    pub fn push_front_list(&mut self, other: &mut List<T>) {
        let Some((head, tail, len)) = self.adopt(other) else {
            return;
        };
        match self.head {
            Some(h) => {
                self.entry_mut(tail).links.next = Some(h);
                self.entry_mut(h).links.prev = Some(tail);
            }
            None => self.tail = Some(tail),
        }
        self.head = Some(head);
        self.len += len;
    }

    /// Drops every element. The list starts over on a fresh arena, so handles
    /// taken before the reset stay stale.
    pub fn reset(&mut self) {
        self.home = Arena::with_capacity(0);
        self.adopted.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates values front to back.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /// Iterates handles front to back.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let at = cursor?;
            cursor = self.entry(at).links.next;
            Some(self.handle_at(at))
        })
    }

    /// Applies `f` to every value front to back.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut T)) {
        let mut cursor = self.head;
        while let Some(at) = cursor {
            let entry = self.entry_mut(at);
            cursor = entry.links.next;
            f(&mut entry.value);
        }
    }

    /// Walks the list both ways and checks link symmetry, head/tail
    /// emptiness and the cached length.
    pub fn links_consistent(&self) -> bool {
        if self.head.is_none() != self.tail.is_none() {
            return false;
        }
        if let Some(h) = self.head {
            if self.entry_opt(h).map_or(true, |e| e.links.prev.is_some()) {
                return false;
            }
        }
        if let Some(t) = self.tail {
            if self.entry_opt(t).map_or(true, |e| e.links.next.is_some()) {
                return false;
            }
        }
        let live = self.home.live + self.adopted.values().map(|a| a.live).sum::<usize>();
        if live != self.len || self.adopted.values().any(|a| a.live == 0) {
            return false;
        }

        let capacity =
            self.home.slots.len() + self.adopted.values().map(|a| a.slots.len()).sum::<usize>();
        let mut count = 0usize;
        let mut prev: Option<Link> = None;
        let mut cursor = self.head;
        while let Some(at) = cursor {
            let Some(entry) = self.entry_opt(at) else {
                return false;
            };
            if entry.links.prev != prev {
                return false;
            }
            count += 1;
            if count > capacity {
                // cycle
                return false;
            }
            prev = Some(at);
            cursor = entry.links.next;
        }
        prev == self.tail && count == self.len
    }

    /// Moves `other`'s arenas into `self` and detaches its chain. Returns
    /// `(head, tail, len)` of the chain, or `None` if `other` was empty.
    fn adopt(&mut self, other: &mut List<T>) -> Option<(Link, Link, usize)> {
        let (Some(head), Some(tail)) = (other.head, other.tail) else {
            return None;
        };
        let len = other.len;
        let home = std::mem::replace(&mut other.home, Arena::with_capacity(0));
        if home.live > 0 {
            self.adopted.insert(home.id, home);
        }
        self.adopted.extend(other.adopted.drain());
        other.head = None;
        other.tail = None;
        other.len = 0;
        Some((head, tail, len))
    }

    fn occupy(&mut self, value: T, links: Links) -> Link {
        self.len += 1;
        let arena = &mut self.home;
        arena.live += 1;
        let entry = Entry { value, links };
        if let Some(i) = arena.vacant.pop() {
            let slot = &mut arena.slots[i as usize];
            debug_assert!(slot.entry.is_none());
            slot.entry = Some(entry);
            return Link {
                arena: arena.id,
                index: i,
            };
        }
        let i = u32::try_from(arena.slots.len()).unwrap_or_else(|_| {
            panic!("list arena exceeded {} slots", u32::MAX);
        });
        arena.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        Link {
            arena: arena.id,
            index: i,
        }
    }

    fn unlink(&mut self, at: Link) -> T {
        let home = self.home.id;
        let Some(arena) = self.arena_mut(at.arena) else {
            unreachable!("unlink in unknown arena {}", at.arena);
        };
        let slot = &mut arena.slots[at.index as usize];
        let Some(Entry { value, links }) = slot.entry.take() else {
            unreachable!("unlink of vacant slot {}", at.index);
        };
        slot.generation = slot.generation.wrapping_add(1);
        arena.vacant.push(at.index);
        arena.live -= 1;
        if arena.live == 0 && at.arena != home {
            self.adopted.remove(&at.arena);
        }
        self.len -= 1;

        match links.prev {
            Some(p) => self.entry_mut(p).links.next = links.next,
            None => self.head = links.next,
        }
        match links.next {
            Some(n) => self.entry_mut(n).links.prev = links.prev,
            None => self.tail = links.prev,
        }
        value
    }

    fn arena(&self, id: u32) -> Option<&Arena<T>> {
        if id == self.home.id {
            Some(&self.home)
        } else {
            self.adopted.get(&id)
        }
    }

    fn arena_mut(&mut self, id: u32) -> Option<&mut Arena<T>> {
        if id == self.home.id {
            Some(&mut self.home)
        } else {
            self.adopted.get_mut(&id)
        }
    }

    fn live_link(&self, handle: Handle) -> Option<Link> {
        let slot = self.arena(handle.arena)?.slots.get(handle.index as usize)?;
        if slot.generation == handle.generation && slot.entry.is_some() {
            Some(handle.link())
        } else {
            None
        }
    }

    fn expect_live(&self, handle: Handle, op: &str) -> Link {
        match self.live_link(handle) {
            Some(at) => at,
            None => panic!("{op}: {handle} is not an element of this list"),
        }
    }

    fn handle_at(&self, at: Link) -> Handle {
        let generation = match self.arena(at.arena) {
            Some(arena) => arena.slots[at.index as usize].generation,
            None => unreachable!("linked arena {} is not owned", at.arena),
        };
        Handle {
            arena: at.arena,
            index: at.index,
            generation,
        }
    }

    fn entry_opt(&self, at: Link) -> Option<&Entry<T>> {
        self.arena(at.arena)?
            .slots
            .get(at.index as usize)?
            .entry
            .as_ref()
    }

    fn entry(&self, at: Link) -> &Entry<T> {
        match self.entry_opt(at) {
            Some(e) => e,
            None => unreachable!("linked slot {}:{} is vacant", at.arena, at.index),
        }
    }

    fn entry_mut(&mut self, at: Link) -> &mut Entry<T> {
        let entry = self
            .arena_mut(at.arena)
            .and_then(|a| a.slots.get_mut(at.index as usize))
            .and_then(|s| s.entry.as_mut());
        match entry {
            Some(e) => e,
            None => unreachable!("linked slot {}:{} is vacant", at.arena, at.index),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

pub struct Iter<'a, T> {
    list: &'a List<T>,
    cursor: Option<Link>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.cursor?;
        let entry = self.list.entry(at);
        self.cursor = entry.links.next;
        self.remaining -= 1;
        Some(&entry.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> Extend<T> for List<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.push_back(v);
        }
    }
}

impl<T> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}
