//! Thread-safe wrapper for concurrent cache access.
//!
//! Enable the `sync` feature to use this module:
//!
//! ```toml
//! [dependencies]
//! spatio-cache = { version = "0.1", features = ["sync"] }
//! ```
//!
//! The feature index, the region tracker and the eviction bookkeeping must
//! change together, so the wrapper holds a single mutex for the full
//! duration of every operation, store round trips included.

use super::{CacheStats, SpatialCache, SplitFilter};
use crate::builder::CacheBuilder;
use crate::filter::Filter;
use crate::query::Query;
use crate::source::FeatureStore;
use crate::types::{Envelope, Feature, FeatureCollection};
use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;

/// Thread-safe wrapper around `SpatialCache` using `Arc<Mutex<SpatialCache>>`.
///
/// Cloning is cheap and every clone addresses the same cache.
#[derive(Clone)]
pub struct SyncSpatialCache {
    inner: Arc<Mutex<SpatialCache>>,
}

impl SyncSpatialCache {
    pub fn new(cache: SpatialCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Build a cache with default configuration for `type_name`.
    pub fn open(store: Arc<dyn FeatureStore>, type_name: &str) -> Result<Self> {
        Ok(Self::new(
            CacheBuilder::new(store).type_name(type_name).build()?,
        ))
    }

    pub fn features(&self, filter: &Filter) -> Result<FeatureCollection> {
        self.inner.lock().features(filter)
    }

    pub fn query(&self, query: &Query) -> Result<FeatureCollection> {
        self.inner.lock().query(query)
    }

    pub fn split_filter(&self, filter: &Filter) -> SplitFilter {
        self.inner.lock().split_filter(filter)
    }

    pub fn get(&self, id: &str) -> Result<Option<Feature>> {
        self.inner.lock().get(id)
    }

    pub fn peek(&self, id: &str) -> Option<Feature> {
        self.inner.lock().peek(id)
    }

    pub fn put(&self, feature: Feature) -> Result<bool> {
        self.inner.lock().put(feature)
    }

    pub fn put_all(&self, features: FeatureCollection, filter: &Filter) -> Result<usize> {
        self.inner.lock().put_all(features, filter)
    }

    pub fn remove(&self, id: &str) -> Result<Option<Feature>> {
        self.inner.lock().remove(id)
    }

    pub fn evict(&self) -> Result<usize> {
        self.inner.lock().evict()
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.lock().clear()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    pub fn tracked_regions(&self) -> Vec<Envelope> {
        self.inner.lock().tracked_regions()
    }

    /// Run `f` with exclusive access to the cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut SpatialCache) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
