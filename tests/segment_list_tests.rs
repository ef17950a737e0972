//! Backpressure list and segment queue tests

use netmem::seg::TcpFlags;
use netmem::{ChunkPool, Countable, CountedList, Engine, NetmemConfig, Segment, SoftLimiter};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq)]
struct Record {
    id: u32,
}

impl Countable for Record {
    fn counted(&self) -> bool {
        true
    }
}

#[derive(Debug)]
struct Marker;

impl Countable for Marker {}

#[test]
fn test_push_back_keeps_insertion_order() {
    let mut list = CountedList::new();
    list.push_back(Record { id: 1 });
    list.push_back(Record { id: 2 });
    list.push_back(Record { id: 3 });

    let ids: Vec<u32> = list.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(list.links_consistent());
}

#[test]
fn test_remove_middle_then_all() {
    let limiter = Arc::new(SoftLimiter::unlimited());
    let mut list = CountedList::with_limiter(Arc::clone(&limiter));
    let a = list.push_back(Record { id: 1 });
    let b = list.push_back(Record { id: 2 });
    let c = list.push_back(Record { id: 3 });

    assert_eq!(list.remove(b), Record { id: 2 });
    assert_eq!(list.len(), 2);
    assert!(list.links_consistent());
    assert_eq!(list.next(a), Some(c));
    assert_eq!(list.prev(c), Some(a));
    assert_eq!(limiter.count(), 2);

    list.remove(a);
    list.remove(c);
    assert!(list.is_empty());
    assert_eq!(list.front(), None);
    assert_eq!(list.back(), None);
    assert!(list.links_consistent());
    assert_eq!(limiter.count(), 0);
}

#[test]
fn test_uncounted_elements_never_count() {
    let limiter = Arc::new(SoftLimiter::new(1, Duration::from_secs(5)));
    let mut list = CountedList::with_limiter(Arc::clone(&limiter));

    let start = Instant::now();
    for _ in 0..10 {
        list.push_back(Marker);
    }
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(limiter.count(), 0);
    assert_eq!(list.counted_len(), 0);
}

#[test]
fn test_producer_delayed_not_rejected() {
    let limiter = Arc::new(SoftLimiter::new(2, Duration::from_millis(40)));
    let mut list = CountedList::with_limiter(Arc::clone(&limiter));

    list.push_back(Record { id: 1 });
    list.push_back(Record { id: 2 });
    let start = Instant::now();
    list.push_back(Record { id: 3 });
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert_eq!(list.len(), 3);

    // Draining below the limit removes the delay
    list.pop_front();
    list.pop_front();
    let start = Instant::now();
    list.push_back(Record { id: 4 });
    assert!(start.elapsed() < Duration::from_millis(40));
}

#[test]
fn test_shared_limiter_across_threads() {
    let limiter = Arc::new(SoftLimiter::new(1_000_000, Duration::from_millis(1)));
    let mut handles = vec![];

    for t in 0..4u32 {
        let limiter = Arc::clone(&limiter);
        handles.push(thread::spawn(move || {
            let mut list = CountedList::with_limiter(limiter);
            for i in 0..500 {
                list.push_back(Record { id: t * 1000 + i });
                if i % 2 == 1 {
                    list.pop_front();
                }
            }
            list.len()
        }));
    }

    let remaining: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(remaining, 4 * 250);
    // Each thread's list was dropped at the end, releasing its counts
    assert_eq!(limiter.count(), 0);
    assert!(limiter.max_count() >= 250);
}

#[test]
fn test_segment_queue_from_engine() {
    let cfg = NetmemConfig::from_json_str(
        r#"{"pool":{"size_classes":[64,128,256,512],"max_chunk_size":512},
            "backpressure":{"soft_limit":8,"delay_ms":1}}"#,
    )
    .expect("valid config");
    let engine = Engine::new(&cfg).expect("engine");
    let mut queue = engine.segment_queue();

    let mut seq = 1000u32;
    let parts: [&[u8]; 3] = [b"GET / HTTP/1.1\r\n", b"Host: x\r\n", b"\r\n"];
    for chunk in parts {
        queue.enqueue(Segment::from_slice(&engine.pool, seq, TcpFlags::PSH, chunk).ack(1));
        seq += chunk.len() as u32;
    }
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.payload_bytes(), 27);
    assert_eq!(engine.limiter.count(), 3);
    assert!(queue.front().map_or(false, |s| s.flags.contains(TcpFlags::ACK)));

    let first = queue.dequeue().expect("non-empty");
    assert_eq!(first.seq, 1000);
    assert_eq!(first.payload.to_vec(), b"GET / HTTP/1.1\r\n");
    drop(first);

    queue.clear();
    assert_eq!(engine.limiter.count(), 0);
    assert_eq!(engine.pool.outstanding_bytes(), 0);
}

#[test]
fn test_segment_payload_large_split() {
    let pool = ChunkPool::new(netmem::PoolConfig::with_classes(vec![64, 128])).unwrap();
    let seg = Segment::from_slice(&pool, 0, TcpFlags::empty(), &[9u8; 384]);
    assert_eq!(seg.payload_len(), 384);
    assert_eq!(seg.payload.view_count(), 3);
    assert!(seg.payload.iter().all(|v| v.capacity() == 128));
}

#[test]
#[should_panic(expected = "not an element")]
fn test_foreign_handle_remove_panics() {
    let limiter = Arc::new(SoftLimiter::unlimited());
    let mut retx = CountedList::with_limiter(Arc::clone(&limiter));
    let mut reasm = CountedList::with_limiter(Arc::clone(&limiter));
    let h = retx.push_back(Record { id: 1 });
    reasm.push_back(Record { id: 99 });
    reasm.remove(h);
}

#[test]
fn test_foreign_handle_leaves_lists_untouched() {
    let limiter = Arc::new(SoftLimiter::unlimited());
    let mut retx = CountedList::with_limiter(Arc::clone(&limiter));
    let mut reasm = CountedList::with_limiter(Arc::clone(&limiter));
    let h = retx.push_back(Record { id: 1 });
    reasm.push_back(Record { id: 99 });

    assert!(!reasm.contains(h));
    assert_eq!(reasm.get(h), None);
    assert_eq!(reasm.try_remove(h), None);
    assert_eq!(reasm.front_value(), Some(&Record { id: 99 }));
    assert_eq!(retx.remove(h), Record { id: 1 });
    assert_eq!(limiter.count(), 1);
}

#[test]
fn test_splice_into_non_empty_keeps_handles() {
    let mut dst = CountedList::new();
    let mut src = CountedList::new();
    let d = dst.push_back(Record { id: 1 });
    let s: Vec<_> = (2..=4).map(|id| src.push_back(Record { id })).collect();

    dst.push_back_list(&mut src);
    assert!(src.is_empty());
    assert_eq!(dst.len(), 4);
    assert_eq!(dst.get(d), Some(&Record { id: 1 }));
    for (h, id) in s.iter().zip(2..) {
        assert_eq!(dst.get(*h), Some(&Record { id }));
    }
    assert_eq!(dst.remove(s[1]), Record { id: 3 });
    let ids: Vec<u32> = dst.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 4]);
    assert!(dst.links_consistent());
}
