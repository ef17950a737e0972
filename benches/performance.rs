use criterion::{black_box, criterion_group, criterion_main, Criterion};
use netmem::{Buffer, ChunkPool, CountedList, Segment, SoftLimiter};
use netmem::seg::TcpFlags;
use std::sync::Arc;

fn bench_acquire_release(c: &mut Criterion) {
    let pool = ChunkPool::with_defaults();
    // Warm the 1500-byte class
    drop(pool.view(1500));

    c.bench_function("view_acquire_release_1500", |b| {
        b.iter(|| {
            let mut view = pool.view(black_box(1500));
            view.write_byte(1).unwrap();
            view.release();
        })
    });

    c.bench_function("chunk_acquire_release_mixed", |b| {
        let sizes = [64usize, 100, 700, 1500, 9000];
        b.iter(|| {
            for &size in &sizes {
                black_box(pool.acquire(size));
            }
        })
    });
}

fn bench_byte_range(c: &mut Criterion) {
    let pool = ChunkPool::with_defaults();
    let mut buf = Buffer::new();
    for i in 0..64u8 {
        buf.push_back(pool.view_from_slice(&[i; 1448]));
    }
    let total = buf.size();

    c.bench_function("for_each_byte_range_mid", |b| {
        b.iter(|| {
            let mut sum = 0usize;
            buf.for_each_byte_range(black_box(total / 3), black_box(16 * 1024), |s| {
                sum += s.len()
            });
            sum
        })
    });
}

fn bench_segment_list(c: &mut Criterion) {
    let limiter = Arc::new(SoftLimiter::unlimited());
    c.bench_function("counted_list_push_pop", |b| {
        let mut list = CountedList::with_limiter(Arc::clone(&limiter));
        b.iter(|| {
            list.push_back(Segment::new(black_box(1), TcpFlags::ACK));
            list.pop_front()
        })
    });
}

criterion_group!(benches, bench_acquire_release, bench_byte_range, bench_segment_list);
criterion_main!(benches);
