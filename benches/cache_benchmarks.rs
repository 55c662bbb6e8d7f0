use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use spatio_cache::compute::spatial::{ArenaRTree, to_bounds};
use spatio_cache::prelude::*;
use std::sync::Arc;

fn grid_store(side: usize) -> Arc<MemoryFeatureStore> {
    let store = Arc::new(MemoryFeatureStore::new());
    store.create_type(FeatureType::new("poi", "geom"));
    for x in 0..side {
        for y in 0..side {
            store
                .insert(
                    "poi",
                    Feature::point(format!("p{}_{}", x, y), x as f64 + 0.5, y as f64 + 0.5),
                )
                .unwrap();
        }
    }
    store
}

fn bench_hit_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_paths");
    let store = grid_store(100);

    group.bench_function("full_hit", |b| {
        let mut cache = CacheBuilder::new(store.clone())
            .type_name("poi")
            .capacity(20_000)
            .build()
            .unwrap();
        cache
            .features(&Filter::bbox("geom", 0.0, 0.0, 100.0, 100.0))
            .unwrap();
        b.iter(|| {
            let found = cache
                .features(black_box(&Filter::bbox("geom", 20.0, 20.0, 30.0, 30.0)))
                .unwrap();
            black_box(found.len())
        });
    });

    group.bench_function("partial_hit", |b| {
        b.iter(|| {
            let mut cache = CacheBuilder::new(store.clone())
                .type_name("poi")
                .capacity(20_000)
                .build()
                .unwrap();
            cache
                .features(&Filter::bbox("geom", 0.0, 0.0, 20.0, 20.0))
                .unwrap();
            let found = cache
                .features(&Filter::bbox("geom", 10.0, 10.0, 30.0, 30.0))
                .unwrap();
            black_box(found.len())
        });
    });

    group.bench_function("store_only", |b| {
        b.iter(|| {
            let found = store
                .features("poi", &Filter::bbox("geom", 20.0, 20.0, 30.0, 30.0))
                .unwrap();
            black_box(found.len())
        });
    });

    group.finish();
}

fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction");

    for policy in [EvictionPolicy::Lru, EvictionPolicy::Random] {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(
            BenchmarkId::new("put_over_capacity", format!("{:?}", policy)),
            &policy,
            |b, &policy| {
                let store = grid_store(1);
                b.iter(|| {
                    let mut cache = CacheBuilder::new(store.clone())
                        .type_name("poi")
                        .capacity(100)
                        .eviction(policy)
                        .build()
                        .unwrap();
                    for i in 0..1000 {
                        let (x, y) = ((i % 97) as f64, (i / 97) as f64);
                        cache.put(Feature::point(format!("f{}", i), x, y)).unwrap();
                    }
                    black_box(cache.evictions())
                });
            },
        );
    }

    group.finish();
}

fn bench_rtree(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_rtree");

    for size in [1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("insert", size), &size, |b, &size| {
            b.iter(|| {
                let mut tree = ArenaRTree::new(8);
                for i in 0..size {
                    let envelope = Envelope::from_point((i % 100) as f64, (i / 100) as f64);
                    tree.insert(to_bounds(&envelope), i);
                }
                black_box(tree.depth())
            });
        });
    }

    let mut tree = ArenaRTree::new(8);
    for i in 0..10_000 {
        let envelope = Envelope::from_point((i % 100) as f64, (i / 100) as f64);
        tree.insert(to_bounds(&envelope), i);
    }
    let window = to_bounds(&Envelope::new(40.0, 40.0, 50.0, 50.0));
    group.bench_function("search", |b| {
        b.iter(|| black_box(tree.search(&window, |_| {}).len()));
    });

    group.finish();
}

criterion_group!(benches, bench_hit_paths, bench_eviction, bench_rtree);
criterion_main!(benches);
