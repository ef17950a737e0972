//! Leaky issuance budget tests

use netmem::{ChunkPool, LeakyBuf, NetmemConfig, View};
use std::sync::Arc;
use std::thread;

#[test]
fn test_gets_without_puts_are_outstanding() {
    let leaky = LeakyBuf::new(ChunkPool::with_defaults(), 8);
    let views: Vec<View> = (0..5).map(|_| leaky.get(100)).collect();

    assert_eq!(leaky.outstanding(), 5);
    assert_eq!(leaky.get_times(), 5);
    assert_eq!(leaky.total_num(), 5);
    assert_eq!(leaky.extra_num(), 0);

    drop(views);
}

#[test]
fn test_matched_pairs_restore_counters() {
    let leaky = LeakyBuf::new(ChunkPool::with_defaults(), 3);
    let before = leaky.total_num();

    for _ in 0..10 {
        let v = leaky.get(64);
        leaky.put(v);
    }
    assert_eq!(leaky.outstanding(), 0);
    assert_eq!(leaky.total_num(), before);
    assert_eq!(leaky.put_times(), 10);
}

#[test]
fn test_over_budget_is_issued_and_visible() {
    let pool = ChunkPool::with_defaults();
    let leaky = LeakyBuf::new(pool.clone(), 2);

    let held: Vec<View> = (0..6).map(|_| leaky.get(200)).collect();
    // Never refused, only accounted
    assert_eq!(held.len(), 6);
    assert!(held.iter().all(|v| v.capacity() == 256));
    assert_eq!(leaky.total_num(), 2);
    assert_eq!(leaky.extra_num(), 4);
    assert!(leaky.is_over_budget());

    drop(held);
    assert!(!leaky.is_over_budget());
    assert_eq!(leaky.total_num(), 0);
    assert_eq!(pool.outstanding_bytes(), 0);
}

#[test]
fn test_release_paths_put_once() {
    let leaky = LeakyBuf::new(ChunkPool::with_defaults(), 4);

    let a = leaky.get(10);
    let b = leaky.get(10);
    let c = leaky.get(10);
    leaky.put(a);
    b.release();
    drop(c);

    assert_eq!(leaky.put_times(), 3);
    assert_eq!(leaky.outstanding(), 0);
}

#[test]
fn test_concurrent_budget() {
    let cfg = NetmemConfig::default();
    let leaky = Arc::new(LeakyBuf::from_config(ChunkPool::with_defaults(), &cfg.leaky));
    let mut handles = vec![];

    for _ in 0..8 {
        let leaky = Arc::clone(&leaky);
        handles.push(thread::spawn(move || {
            let mut held = Vec::new();
            for i in 0..1_000 {
                held.push(leaky.get(64));
                if i % 3 == 0 {
                    held.clear();
                }
                assert!(leaky.total_num() <= leaky.max_free_len());
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(leaky.outstanding(), 0);
    assert_eq!(leaky.total_num(), 0);
    assert_eq!(leaky.extra_num(), 0);
    assert_eq!(leaky.get_times(), 8_000);
}
