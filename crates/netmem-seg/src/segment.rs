//! TCP segments and the queue that holds them.
//!
//! Sequence-number arithmetic, timers and congestion control belong to the
//! protocol state machine; this module only keeps segments in order and
//! accounts for their payload.

use std::sync::Arc;

use netmem_core::Handle;
use netmem_mem::{Buffer, ChunkPool};
use serde::{Deserialize, Serialize};

use crate::backpressure::SoftLimiter;
use crate::list::{Countable, CountedList};

/// TCP header flag bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TcpFlags(u8);

impl TcpFlags {
    pub const FIN: TcpFlags = TcpFlags(0x01);
    pub const SYN: TcpFlags = TcpFlags(0x02);
    pub const RST: TcpFlags = TcpFlags(0x04);
    pub const PSH: TcpFlags = TcpFlags(0x08);
    pub const ACK: TcpFlags = TcpFlags(0x10);
    pub const URG: TcpFlags = TcpFlags(0x20);

    pub const fn empty() -> Self {
        TcpFlags(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        TcpFlags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: TcpFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TcpFlags {
    type Output = TcpFlags;

    fn bitor(self, rhs: TcpFlags) -> TcpFlags {
        TcpFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for TcpFlags {
    fn bitor_assign(&mut self, rhs: TcpFlags) {
        self.0 |= rhs.0;
    }
}

/// One TCP segment with its payload views.
#[derive(Debug)]
pub struct Segment {
    pub seq: u32,
    pub ack: u32,
    pub flags: TcpFlags,
    pub window: u16,
    pub payload: Buffer,
    /// Times this segment has been put on the wire.
    pub transmits: u32,
    counted: bool,
}

impl Segment {
    /// Segment with an empty payload. Counted for backpressure by default.
    pub fn new(seq: u32, flags: TcpFlags) -> Self {
        Self {
            seq,
            ack: 0,
            flags,
            window: 0,
            payload: Buffer::new(),
            transmits: 0,
            counted: true,
        }
    }

    pub fn with_payload(seq: u32, flags: TcpFlags, payload: Buffer) -> Self {
        Self {
            payload,
            ..Self::new(seq, flags)
        }
    }

    /// Copies `data` into views from `pool`.
    pub fn from_slice(pool: &ChunkPool, seq: u32, flags: TcpFlags, data: &[u8]) -> Self {
        let mut payload = Buffer::new();
        payload.append(pool, data);
        Self::with_payload(seq, flags, payload)
    }

    pub fn ack(mut self, ack: u32) -> Self {
        self.ack = ack;
        self.flags |= TcpFlags::ACK;
        self
    }

    pub fn window(mut self, window: u16) -> Self {
        self.window = window;
        self
    }

    /// Sets whether this segment takes part in backpressure accounting.
    pub fn with_counted(mut self, counted: bool) -> Self {
        self.counted = counted;
        self
    }

    pub fn payload_len(&self) -> usize {
        self.payload.size()
    }
}

impl Countable for Segment {
    fn counted(&self) -> bool {
        self.counted
    }
}

/// Ordered segment queue (retransmission or reassembly) with payload
/// accounting. Producers that enqueue past the limiter's soft limit are
/// delayed.
#[derive(Debug, Default)]
pub struct SegmentQueue {
    segments: CountedList<Segment>,
    payload_bytes: usize,
}

impl SegmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limiter(limiter: Arc<SoftLimiter>) -> Self {
        Self {
            segments: CountedList::with_limiter(limiter),
            payload_bytes: 0,
        }
    }

    /// Appends at the back; may delay the caller (see [`SoftLimiter::admit`]).
    pub fn enqueue(&mut self, segment: Segment) -> Handle {
        self.payload_bytes += segment.payload_len();
        self.segments.push_back(segment)
    }

    /// Puts a segment back at the head, for example after a failed transmit.
    pub fn requeue_front(&mut self, segment: Segment) -> Handle {
        self.payload_bytes += segment.payload_len();
        self.segments.push_front(segment)
    }

    pub fn dequeue(&mut self) -> Option<Segment> {
        let segment = self.segments.pop_front()?;
        self.payload_bytes -= segment.payload_len();
        Some(segment)
    }

    /// # Panics
    /// Panics if `handle` is not a segment of this queue.
    pub fn remove(&mut self, handle: Handle) -> Segment {
        let segment = self.segments.remove(handle);
        self.payload_bytes -= segment.payload_len();
        segment
    }

    pub fn front(&self) -> Option<&Segment> {
        self.segments.front_value()
    }

    pub fn back(&self) -> Option<&Segment> {
        self.segments.back_value()
    }

    pub fn get(&self, handle: Handle) -> Option<&Segment> {
        self.segments.get(handle)
    }

    /// Records a transmission of the segment at `handle`; returns the new count.
    pub fn mark_transmitted(&mut self, handle: Handle) -> Option<u32> {
        let segment = self.segments.get_mut(handle)?;
        segment.transmits += 1;
        Some(segment.transmits)
    }

    pub fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn counted_len(&self) -> usize {
        self.segments.counted_len()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Segment> + '_ {
        self.segments.iter()
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.segments.handles()
    }

    /// Drops every segment, releasing payload views and counts.
    pub fn clear(&mut self) {
        self.segments.reset();
        self.payload_bytes = 0;
    }

    pub fn links_consistent(&self) -> bool {
        self.segments.links_consistent()
            && self.segments.iter().map(Segment::payload_len).sum::<usize>() == self.payload_bytes
    }
}
