#![forbid(unsafe_code)]
//! netmem-seg: backpressure-aware segment lists.
//!
//! [`CountedList`] is a doubly linked list whose counted elements feed a
//! shared [`SoftLimiter`]. Producers appending past the soft limit are delayed,
//! never refused. [`SegmentQueue`] instantiates it for TCP segments.

pub mod backpressure;
pub mod list;
pub mod segment;

pub use backpressure::SoftLimiter;
pub use list::{Countable, CountedList};
pub use segment::{Segment, SegmentQueue, TcpFlags};
