use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lineproto_core::{ChunkedLineReader, ReaderConfig, ReaderPool};

const BODY: &[u8] = b"cpu,host=a v=1 1000\nmem,host=a v=2 1000\n";

fn bench_acquire_release(c: &mut Criterion) {
    let pooled: ReaderPool<&[u8]> = ReaderPool::new(ReaderConfig::default(), 256);
    let unpooled: ReaderPool<&[u8]> = ReaderPool::unpooled(ReaderConfig::default());
    let mut group = c.benchmark_group("reader_acquire_release");

    for (label, pool) in [("pooled", &pooled), ("unpooled", &unpooled)] {
        group.bench_function(label, |b| {
            b.iter(|| {
                let mut reader = pool.acquire(black_box(BODY));
                while reader.advance() {
                    black_box(reader.current());
                }
            })
        });
    }

    group.bench_function("fresh_reader", |b| {
        b.iter(|| {
            let mut reader = ChunkedLineReader::from_source(black_box(BODY), ReaderConfig::default());
            while reader.advance() {
                black_box(reader.current());
            }
        })
    });

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_pool_contended");

    for workers in [2usize, 4, 8] {
        let pool: Arc<ReaderPool<&'static [u8]>> =
            Arc::new(ReaderPool::new(ReaderConfig::default(), workers));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            b.iter(|| {
                let handles: Vec<_> = (0..workers)
                    .map(|_| {
                        let pool = Arc::clone(&pool);
                        thread::spawn(move || {
                            for _ in 0..64 {
                                let mut reader = pool.acquire(BODY);
                                while reader.advance() {}
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().expect("bench worker panicked");
                }
            })
        });
    }

    group.finish();
}

fn run_benches(c: &mut Criterion) {
    bench_acquire_release(c);
    bench_contended(c);
}

criterion_group!(benches, run_benches);
criterion_main!(benches);
