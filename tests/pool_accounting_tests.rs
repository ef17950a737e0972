//! Chunk pool accounting tests

use netmem::{ChunkPool, PoolConfig};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn small_pool() -> ChunkPool {
    ChunkPool::new(PoolConfig::with_classes(vec![64, 128, 256, 512])).expect("valid table")
}

#[test]
fn test_request_100_round_trip() {
    let pool = small_pool();
    let before = pool.outstanding_bytes();

    // 100 bytes is served from the 128-byte class
    let mut view = pool.view(100);
    assert_eq!(view.capacity(), 128);
    assert_eq!(pool.outstanding_bytes() - before, 128);

    view.write(&[0x5a; 100]).expect("fits");
    assert_eq!(view.size(), 100);

    view.release();
    assert_eq!(pool.outstanding_bytes(), before);
}

#[test]
fn test_round_trip_every_size() {
    let pool = small_pool();
    for size in 1..=512 {
        let before = pool.outstanding_bytes();
        let mut chunk = pool.acquire(size);
        chunk.as_mut_slice()[..size].fill(0xff);
        drop(chunk);
        assert_eq!(pool.outstanding_bytes(), before, "size {size}");
    }
}

#[test]
fn test_shared_chunk_released_once() {
    let pool = small_pool();
    let a = pool.view_from_slice(b"shared");
    let b = a.share();
    let c = b.share();
    assert_eq!(a.ref_count(), 3);

    drop(a);
    drop(c);
    // One owner left, block still out
    assert_eq!(pool.outstanding_bytes(), 64);
    assert_eq!(pool.stats().class(64).map(|s| s.free), Some(0));

    drop(b);
    assert_eq!(pool.outstanding_bytes(), 0);
    assert_eq!(pool.stats().class(64).map(|s| s.free), Some(1));
}

#[test]
fn test_oversize_bypasses_buckets() {
    let pool = ChunkPool::with_defaults();
    let big = pool.view(100_000);
    assert_eq!(big.capacity(), 100_000);
    assert_eq!(pool.outstanding_bytes(), 100_000);
    assert_eq!(pool.class_for(100_000), None);

    drop(big);
    let stats = pool.stats();
    assert_eq!(stats.outstanding_bytes, 0);
    assert_eq!(stats.oversize_allocations, 1);
    assert!(stats.classes.iter().all(|c| c.free == 0));
}

#[test]
fn test_zero_size_is_empty_and_free() {
    let pool = small_pool();
    let view = pool.view(0);
    assert_eq!(view.capacity(), 0);
    assert_eq!(pool.outstanding_bytes(), 0);
    drop(view);
    assert_eq!(pool.outstanding_bytes(), 0);
}

#[test]
fn test_concurrent_acquire_release() {
    let pool = Arc::new(small_pool());
    // Bytes every thread is about to take, and bytes given back
    let announced = Arc::new(AtomicUsize::new(0));
    let retracted = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for t in 0..8 {
        let pool = Arc::clone(&pool);
        let announced = Arc::clone(&announced);
        let retracted = Arc::clone(&retracted);
        let handle = thread::spawn(move || {
            let mut held = Vec::new();
            for i in 0..2_000usize {
                let size = 1 + (i * 37 + t * 11) % 512;
                let class = pool.class_for(size).expect("size within classes");
                announced.fetch_add(class, Ordering::SeqCst);
                let mut view = pool.view(size);
                assert_eq!(view.capacity(), class);
                view.write(&vec![t as u8; size]).expect("sized to fit");
                held.push(view);
                if held.len() > 16 {
                    let gone = held.swap_remove(i % held.len());
                    let cap = gone.capacity();
                    drop(gone);
                    retracted.fetch_add(cap, Ordering::SeqCst);
                }

                // Outstanding bytes cover at least what this thread holds
                let mine: usize = held.iter().map(|v| v.capacity()).sum();
                assert!(pool.outstanding_bytes() >= mine);

                // and never exceed what all threads may hold right now
                let r = retracted.load(Ordering::SeqCst);
                let o = pool.outstanding_bytes();
                let a = announced.load(Ordering::SeqCst);
                assert!(o <= a - r, "outstanding {o} > announced {a} - retracted {r}");
            }
            for view in held.drain(..) {
                let cap = view.capacity();
                drop(view);
                retracted.fetch_add(cap, Ordering::SeqCst);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(announced.load(Ordering::SeqCst), retracted.load(Ordering::SeqCst));
    assert_eq!(pool.outstanding_bytes(), 0);
    let stats = pool.stats();
    assert!(stats.reuse_ratio() > 0.0);
    assert!(stats.peak_outstanding_bytes >= 512);
    assert!(stats.peak_outstanding_bytes <= 8 * 17 * 512);
    assert!(stats.classes.iter().all(|c| c.in_use == 0));
}

#[test]
fn test_stats_serialize() {
    let pool = small_pool();
    let _v = pool.view(200);
    let json = pool.stats().to_json().expect("serializable");
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["outstanding_bytes"], 256);
    assert_eq!(parsed["classes"][2]["in_use"], 1);
    assert!(pool.stats().summary().contains("outstanding 256 bytes"));
}

#[cfg(feature = "census")]
#[test]
fn test_census_observer_counts_tags() {
    use netmem::mem::Census;

    let census = Arc::new(Census::new());
    let pool = ChunkPool::builder()
        .config(PoolConfig::with_classes(vec![64, 128]))
        .observer(census.clone())
        .build()
        .unwrap();

    let rx = pool.view_with_tag("rx", 100);
    let rx2 = rx.share();
    let _tx = pool.view_with_tag("tx", 10);
    drop(rx);

    let snap = census.snapshot();
    assert_eq!(snap.views["rx"], 1);
    assert_eq!(snap.views["tx"], 1);
    assert_eq!(snap.in_use[&128], 1);
    assert_eq!(snap.top_requested(1)[0].size, 100);

    drop(rx2);
    assert_eq!(census.snapshot().views["rx"], 0);
}

proptest! {
    #[test]
    fn prop_bucket_is_minimal(size in 1usize..=65536) {
        let pool = ChunkPool::with_defaults();
        let class = pool.class_for(size).expect("every size up to the max has a class");
        prop_assert!(class >= size);
        prop_assert!(pool.size_classes().iter().all(|&c| c < size || c >= class));

        let chunk = pool.acquire(size);
        prop_assert_eq!(chunk.len(), class);
        prop_assert_eq!(pool.outstanding_bytes(), class);
    }
}
