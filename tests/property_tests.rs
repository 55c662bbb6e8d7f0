//! Property-based tests for the cache's coverage and capacity guarantees.

use proptest::prelude::*;
use spatio_cache::prelude::*;
use std::sync::Arc;

const GRID: usize = 20;

fn grid_store() -> Arc<MemoryFeatureStore> {
    let store = Arc::new(MemoryFeatureStore::new());
    store.create_type(FeatureType::new("poi", "geom"));
    for x in 0..GRID {
        for y in 0..GRID {
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

/// A rectangle inside the grid, at least one unit wide and high.
fn arb_envelope() -> impl Strategy<Value = Envelope> {
    (0..GRID - 1, 0..GRID - 1, 1..8usize, 1..8usize).prop_map(|(x, y, w, h)| {
        let max_x = (x + w).min(GRID);
        let max_y = (y + h).min(GRID);
        Envelope::new(x as f64, y as f64, max_x as f64, max_y as f64)
    })
}

#[derive(Debug, Clone)]
enum Op {
    Query(Envelope),
    Put(u32, f64, f64),
    Remove(usize, usize),
    Evict,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => arb_envelope().prop_map(Op::Query),
        2 => (0..1000u32, 0.0..20.0f64, 0.0..20.0f64).prop_map(|(i, x, y)| Op::Put(i, x, y)),
        1 => (0..GRID, 0..GRID).prop_map(|(x, y)| Op::Remove(x, y)),
        1 => Just(Op::Evict),
    ]
}

fn expected_ids(store: &MemoryFeatureStore, envelope: &Envelope) -> Vec<String> {
    let filter = Filter::bbox_envelope("geom", *envelope);
    let mut ids: Vec<String> = store
        .features("poi", &filter)
        .unwrap()
        .ids()
        .into_iter()
        .map(String::from)
        .collect();
    ids.sort();
    ids
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever happens to the cache, a query returns exactly what the store
    /// holds for that area: evictions and removals never leave stale claims.
    #[test]
    fn prop_queries_match_store(
        capacity in 5..60usize,
        lru in any::<bool>(),
        ops in prop::collection::vec(arb_op(), 1..40),
    ) {
        let store = grid_store();
        let policy = if lru { EvictionPolicy::Lru } else { EvictionPolicy::Random };
        let mut cache = CacheBuilder::new(store.clone())
            .type_name("poi")
            .capacity(capacity)
            .eviction(policy)
            .build()
            .unwrap();

        for op in ops {
            match op {
                Op::Query(envelope) => {
                    let filter = Filter::bbox_envelope("geom", envelope);
                    let mut got: Vec<String> = cache
                        .features(&filter)
                        .unwrap()
                        .ids()
                        .into_iter()
                        .map(String::from)
                        .collect();
                    got.sort();
                    prop_assert_eq!(got, expected_ids(&store, &envelope));
                }
                Op::Put(i, x, y) => {
                    // off-grid features live only in the cache, outside any query area
                    cache.put(Feature::point(format!("extra{}", i), x + 100.0, y + 100.0)).unwrap();
                }
                Op::Remove(x, y) => {
                    cache.remove(&format!("p{}_{}", x, y)).unwrap();
                }
                Op::Evict => {
                    cache.evict().unwrap();
                }
            }
            prop_assert!(cache.len() <= capacity);
        }
    }

    /// Putting the same feature twice is the same as putting it once.
    #[test]
    fn prop_put_is_idempotent(
        points in prop::collection::vec((0.0..50.0f64, 0.0..50.0f64), 1..30),
    ) {
        let store = grid_store();
        let mut cache = CacheBuilder::new(store)
            .type_name("poi")
            .capacity(100)
            .build()
            .unwrap();

        for (i, (x, y)) in points.iter().enumerate() {
            let feature = Feature::point(format!("f{}", i), *x, *y);
            prop_assert!(cache.put(feature.clone()).unwrap());
            let len = cache.len();
            prop_assert!(!cache.put(feature).unwrap());
            prop_assert_eq!(cache.len(), len);
        }
        prop_assert_eq!(cache.index().tree().len(), points.len());
    }

    /// Size never exceeds capacity, however many features are put, and every
    /// feature put is either still cached or counted as evicted.
    #[test]
    fn prop_capacity_bound(
        capacity in 1..20usize,
        count in 0..200usize,
    ) {
        let store = grid_store();
        let mut cache = CacheBuilder::new(store)
            .type_name("poi")
            .capacity(capacity)
            .build()
            .unwrap();

        for i in 0..count {
            cache.put(Feature::point(format!("f{}", i), (i % 13) as f64, (i % 17) as f64)).unwrap();
            prop_assert!(cache.len() <= capacity);
        }
        prop_assert_eq!(cache.evictions() as usize + cache.len(), count);
    }

    /// A query inside a tracked region never reaches the store.
    #[test]
    fn prop_full_hit_is_free(outer in arb_envelope(), fx in 0.0..1.0f64, fy in 0.0..1.0f64) {
        let store = grid_store();
        let mut cache = CacheBuilder::new(store.clone())
            .type_name("poi")
            .capacity(1000)
            .build()
            .unwrap();
        let outer_filter = Filter::bbox_envelope("geom", outer);
        cache.features(&outer_filter).unwrap();
        let reads = store.fetch_count();

        let inner = Envelope::new(
            outer.min_x() + fx * outer.width() / 2.0,
            outer.min_y() + fy * outer.height() / 2.0,
            outer.max_x(),
            outer.max_y(),
        );
        let inner_filter = Filter::bbox_envelope("geom", inner);
        let got = cache.features(&inner_filter).unwrap();
        prop_assert_eq!(store.fetch_count(), reads);
        prop_assert_eq!(got.len(), expected_ids(&store, &inner).len());
    }
}
