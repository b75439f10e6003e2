use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kick_filter::{CuckooFilter, Exhaustion};

/// Single-threaded insert/delete cycle with a sliding window of 100k items
/// over a filter sized for 131k.
fn bench_insert_and_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_and_delete");

    for (name, max_kicks) in [("max_kicks_500", 500), ("max_kicks_0", 0)] {
        let filter = CuckooFilter::builder()
            .capacity(131072)
            .max_kicks(max_kicks)
            .build()
            .unwrap();
        let mut i: u64 = 100_000;
        group.bench_function(name, |b| {
            b.iter(|| {
                i += 1;
                black_box(filter.insert(&i.to_le_bytes()));
                black_box(filter.delete(&(i - 100_000).to_le_bytes()));
            });
        });
    }

    group.finish();
}

/// Test-and-insert with a growing set of distinct items.
fn bench_insert_unique(c: &mut Criterion) {
    let filter = CuckooFilter::builder().capacity(131072).build().unwrap();
    let mut i: u16 = 0;
    c.bench_function("insert_unique", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            black_box(filter.insert_unique(&i.to_le_bytes()));
        });
    });
}

/// Lookups at increasing load factors, hits and misses alternating.
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for load in [25u64, 50, 90] {
        let filter = CuckooFilter::builder().capacity(131072).build().unwrap();
        let items = filter.capacity() as u64 * load / 100;
        for i in 0..items {
            filter.insert(&i.to_le_bytes());
        }

        group.bench_with_input(BenchmarkId::new("load", load), &items, |b, &items| {
            let mut i = 0u64;
            b.iter(|| {
                i = (i + 1) % (items * 2);
                black_box(filter.lookup(&i.to_le_bytes()))
            });
        });
    }

    group.finish();
}

/// Fill an empty filter until the first failed insertion, for both
/// exhaustion policies.
fn bench_fill_until_full(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_until_full");
    group.sample_size(10);

    for exhaustion in [Exhaustion::Rollback, Exhaustion::DropLast] {
        group.bench_with_input(
            BenchmarkId::new("exhaustion", format!("{exhaustion:?}")),
            &exhaustion,
            |b, &exhaustion| {
                b.iter(|| {
                    let filter = CuckooFilter::builder()
                        .capacity(16384)
                        .exhaustion(exhaustion)
                        .build()
                        .unwrap();
                    let mut i = 0u32;
                    while filter.insert(&i.to_le_bytes()) {
                        i += 1;
                    }
                    black_box(filter.load_factor())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_and_delete,
    bench_insert_unique,
    bench_lookup,
    bench_fill_until_full
);
criterion_main!(benches);
