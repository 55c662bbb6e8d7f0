//! Caches for every feature type of a store.
//!
//! [`StoreCache`] owns one [`SpatialCache`] per type the store publishes and
//! routes queries by type name. The application creates and owns it; there
//! is no process-wide registry.

use crate::builder::CacheBuilder;
use crate::cache::{CacheStats, SpatialCache};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::filter::Filter;
use crate::query::Query;
use crate::source::FeatureStore;
use crate::types::FeatureCollection;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One cache per feature type of a store.
pub struct StoreCache {
    store: Arc<dyn FeatureStore>,
    caches: BTreeMap<String, SpatialCache>,
}

impl StoreCache {
    /// Build a cache for each of the store's types, all with `config`.
    pub fn new(store: Arc<dyn FeatureStore>, config: CacheConfig) -> Result<Self> {
        let mut caches = BTreeMap::new();
        for type_name in store.type_names()? {
            let cache = CacheBuilder::new(store.clone())
                .type_name(type_name.clone())
                .config(config.clone())
                .build()?;
            caches.insert(type_name, cache);
        }
        log::debug!("built store cache over {} feature type(s)", caches.len());
        Ok(Self { store, caches })
    }

    pub fn store(&self) -> &Arc<dyn FeatureStore> {
        &self.store
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.caches.keys().map(String::as_str).collect()
    }

    pub fn cache(&self, type_name: &str) -> Option<&SpatialCache> {
        self.caches.get(type_name)
    }

    pub fn cache_mut(&mut self, type_name: &str) -> Result<&mut SpatialCache> {
        self.caches
            .get_mut(type_name)
            .ok_or_else(|| CacheError::SchemaNotFound(type_name.to_string()))
    }

    /// Route `query` to the cache of its type.
    pub fn query(&mut self, query: &Query) -> Result<FeatureCollection> {
        self.cache_mut(&query.type_name)?.query(query)
    }

    pub fn features(&mut self, type_name: &str, filter: &Filter) -> Result<FeatureCollection> {
        self.cache_mut(type_name)?.features(filter)
    }

    /// Counters summed over every type.
    pub fn stats(&self) -> CacheStats {
        let mut total = CacheStats::default();
        for cache in self.caches.values() {
            total += cache.stats();
        }
        total
    }

    pub fn clear_all(&mut self) -> Result<()> {
        for cache in self.caches.values_mut() {
            cache.clear()?;
        }
        Ok(())
    }
}
