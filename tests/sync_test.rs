use spatio_cache::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

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

#[test]
fn test_concurrent_readers_share_one_fetch() {
    let store = grid_store(10);
    let cache = SyncSpatialCache::open(store.clone(), "poi").unwrap();
    cache
        .features(&Filter::bbox("geom", 0.0, 0.0, 10.0, 10.0))
        .unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let x = (t % 5) as f64;
                let found = cache
                    .features(&Filter::bbox("geom", x, x, x + 5.0, x + 5.0))
                    .unwrap();
                assert_eq!(found.len(), 25);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.fetch_count(), 1);
    assert_eq!(cache.stats().cache_reads, 8);
}

#[test]
fn test_concurrent_writers_respect_capacity() {
    let store = grid_store(1);
    let cache = SyncSpatialCache::new(
        CacheBuilder::new(store)
            .type_name("poi")
            .capacity(16)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    let id = format!("t{}_{}", t, i);
                    cache
                        .put(Feature::point(id.clone(), t as f64 * 10.0, i as f64))
                        .unwrap();
                    assert!(cache.len() <= 16);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.len() <= 16);
    assert_eq!(cache.stats().evictions as usize + cache.len(), 400);
}

#[test]
fn test_with_cache_gives_exclusive_access() {
    let store = grid_store(3);
    let cache = SyncSpatialCache::open(store, "poi").unwrap();
    cache
        .features(&Filter::bbox("geom", 0.0, 0.0, 3.0, 3.0))
        .unwrap();

    let (len, regions) = cache.with_cache(|inner| (inner.len(), inner.tracked_regions().len()));
    assert_eq!(len, 9);
    assert_eq!(regions, 1);

    assert!(cache.remove("p1_1").unwrap().is_some());
    assert!(cache.tracked_regions().is_empty());
}
