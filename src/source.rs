//! Backing feature store abstraction.
//!
//! The cache never writes to its store; it only asks for schemas and for
//! the features matching a filter. `MemoryFeatureStore` is a complete
//! in-process implementation used for pre-warmed datasets and tests.

use crate::error::{CacheError, Result};
use crate::filter::Filter;
use crate::types::{Feature, FeatureCollection, FeatureType};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Trait for the (expensive) geospatial store a cache sits in front of.
///
/// Calls are blocking; a cache holds its store behind an `Arc` so a single
/// store can back one cache per feature type.
pub trait FeatureStore: Send + Sync {
    /// Names of every feature type the store publishes.
    fn type_names(&self) -> Result<Vec<String>>;

    /// Schema of one feature type.
    ///
    /// Returns `CacheError::SchemaNotFound` for unknown types.
    fn schema(&self, type_name: &str) -> Result<FeatureType>;

    /// Features of `type_name` matching `filter`.
    ///
    /// Implementations must at least support conjunctions of a bounding-box
    /// predicate with arbitrary additional predicates, and disjunctions of
    /// bounding boxes.
    fn features(&self, type_name: &str, filter: &Filter) -> Result<FeatureCollection>;
}

struct TypeTable {
    schema: FeatureType,
    features: BTreeMap<String, Feature>,
}

/// In-memory feature store with per-type tables.
///
/// Every call to [`FeatureStore::features`] counts as one fetch, which makes
/// the store a convenient probe for "did the cache go to the store?".
pub struct MemoryFeatureStore {
    tables: RwLock<FxHashMap<String, TypeTable>>,
    fetches: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryFeatureStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(FxHashMap::default()),
            fetches: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Publish a feature type. Replaces any previous table of the same name.
    pub fn create_type(&self, schema: FeatureType) {
        let name = schema.name().to_string();
        self.tables.write().insert(
            name,
            TypeTable {
                schema,
                features: BTreeMap::new(),
            },
        );
    }

    /// Insert or replace a feature.
    pub fn insert(&self, type_name: &str, feature: Feature) -> Result<Option<Feature>> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(type_name)
            .ok_or_else(|| CacheError::SchemaNotFound(type_name.to_string()))?;
        Ok(table.features.insert(feature.id().to_string(), feature))
    }

    pub fn insert_all<I>(&self, type_name: &str, features: I) -> Result<usize>
    where
        I: IntoIterator<Item = Feature>,
    {
        let mut count = 0;
        for feature in features {
            self.insert(type_name, feature)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn remove(&self, type_name: &str, id: &str) -> Result<Option<Feature>> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(type_name)
            .ok_or_else(|| CacheError::SchemaNotFound(type_name.to_string()))?;
        Ok(table.features.remove(id))
    }

    /// Number of features stored for `type_name`.
    pub fn len(&self, type_name: &str) -> usize {
        self.tables
            .read()
            .get(type_name)
            .map_or(0, |t| t.features.len())
    }

    /// Number of `features` calls served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Make every subsequent fetch fail with `CacheError::StoreIo`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }
}

impl Default for MemoryFeatureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn type_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn schema(&self, type_name: &str) -> Result<FeatureType> {
        self.tables
            .read()
            .get(type_name)
            .map(|t| t.schema.clone())
            .ok_or_else(|| CacheError::SchemaNotFound(type_name.to_string()))
    }

    fn features(&self, type_name: &str, filter: &Filter) -> Result<FeatureCollection> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(CacheError::StoreIo(format!(
                "store unavailable while reading '{}'",
                type_name
            )));
        }
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let tables = self.tables.read();
        let table = tables
            .get(type_name)
            .ok_or_else(|| CacheError::SchemaNotFound(type_name.to_string()))?;

        let features = table
            .features
            .values()
            .filter(|f| filter.evaluate(f))
            .cloned()
            .collect();
        Ok(FeatureCollection::new(type_name, features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_points() -> MemoryFeatureStore {
        let store = MemoryFeatureStore::new();
        store.create_type(FeatureType::new("poi", "geom"));
        store
            .insert_all(
                "poi",
                (0..10).map(|i| Feature::point(format!("poi.{}", i), i as f64, i as f64)),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_features_by_bbox() {
        let store = store_with_points();
        let result = store
            .features("poi", &Filter::bbox("geom", 2.0, 2.0, 4.5, 4.5))
            .unwrap();
        assert_eq!(result.ids(), vec!["poi.2", "poi.3", "poi.4"]);
        assert_eq!(store.fetch_count(), 1);
    }

    #[test]
    fn test_unknown_type() {
        let store = store_with_points();
        assert!(matches!(
            store.schema("roads"),
            Err(CacheError::SchemaNotFound(name)) if name == "roads"
        ));
        assert!(store.insert("roads", Feature::point("r", 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_unavailable_store_fails_without_counting() {
        let store = store_with_points();
        store.set_unavailable(true);
        assert!(matches!(
            store.features("poi", &Filter::Include),
            Err(CacheError::StoreIo(_))
        ));
        assert_eq!(store.fetch_count(), 0);

        store.set_unavailable(false);
        assert_eq!(store.features("poi", &Filter::Include).unwrap().len(), 10);
    }

    #[test]
    fn test_type_names_sorted() {
        let store = store_with_points();
        store.create_type(FeatureType::new("alpha", "geom"));
        assert_eq!(store.type_names().unwrap(), vec!["alpha", "poi"]);
    }
}
