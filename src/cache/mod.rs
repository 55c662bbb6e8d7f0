//! Spatial result cache.
//!
//! This module defines [`SpatialCache`], which sits in front of a
//! [`FeatureStore`] for one feature type and answers bounding-box queries
//! from memory wherever earlier queries already fetched the area.

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::filter::Filter;
use crate::query::Query;
use crate::source::FeatureStore;
use crate::types::{Envelope, Feature, FeatureCollection, FeatureType};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
#[cfg(not(feature = "sync"))]
use std::marker::PhantomData;
use std::ops::AddAssign;
use std::sync::Arc;

pub mod eviction;
pub mod index;
pub mod listener;
pub mod tracker;
pub mod view;

#[cfg(feature = "sync")]
mod sync;

pub use eviction::EvictionPolicy;
pub use index::FeatureIndex;
pub use listener::{EvictionEvent, EvictionListener, EvictionReason};
pub use tracker::RegionTracker;
pub use view::FeatureView;

#[cfg(feature = "sync")]
pub use sync::SyncSpatialCache;

use listener::Listeners;

/// Cache counters. All counters only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Operations answered at least partly from memory
    pub cache_reads: u64,
    /// Round trips to the backing store
    pub store_reads: u64,
    /// Features dropped by the eviction policy
    pub evictions: u64,
}

impl AddAssign for CacheStats {
    fn add_assign(&mut self, other: Self) {
        self.cache_reads += other.cache_reads;
        self.store_reads += other.store_reads;
        self.evictions += other.evictions;
    }
}

/// A query filter split by what the cache can answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitFilter {
    /// Spatial part answerable from memory, `Exclude` if none.
    pub cached: Filter,
    /// Spatial part that must come from the store, `Exclude` if none.
    pub missing: Filter,
    /// Everything that is not the tracked bounding box.
    pub other: Filter,
}

/// Read-through cache of one feature type of a [`FeatureStore`].
///
/// The cache keeps three structures in step: the feature index (features by
/// envelope), the region tracker (areas whose features are all in memory)
/// and the eviction bookkeeping. Every region it claims is backed by the
/// features it holds; evicting or removing a feature revokes the regions
/// around it, so a later query over that area goes back to the store.
///
/// # Thread Safety
///
/// `SpatialCache` is **not** thread-safe by default: it cannot be sent
/// between threads. Enable the `sync` feature for
/// [`SyncSpatialCache`](crate::SyncSpatialCache), which holds one lock for
/// the whole of each operation.
///
/// # Examples
///
/// ```rust
/// use spatio_cache::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> spatio_cache::Result<()> {
/// let store = Arc::new(MemoryFeatureStore::new());
/// store.create_type(FeatureType::new("stations", "geom"));
/// store.insert("stations", Feature::point("s1", 13.40, 52.52))?;
/// store.insert("stations", Feature::point("s2", 13.45, 52.50))?;
///
/// let mut cache = CacheBuilder::new(store.clone())
///     .type_name("stations")
///     .capacity(100)
///     .build()?;
///
/// let berlin = Filter::bbox("geom", 13.0, 52.0, 14.0, 53.0);
/// assert_eq!(cache.features(&berlin)?.len(), 2);
///
/// // a smaller query inside the fetched area never reaches the store
/// let mitte = Filter::bbox("geom", 13.35, 52.51, 13.42, 52.53);
/// assert_eq!(cache.features(&mitte)?.len(), 1);
/// assert_eq!(cache.stats().store_reads, 1);
/// # Ok(())
/// # }
/// ```
pub struct SpatialCache {
    schema: FeatureType,
    store: Arc<dyn FeatureStore>,
    index: FeatureIndex,
    tracker: RegionTracker,
    listeners: Listeners,
    config: CacheConfig,
    has_overflow: bool,
    stats: CacheStats,
    #[cfg(not(feature = "sync"))]
    _not_send_sync: PhantomData<*const ()>,
}

impl SpatialCache {
    pub(crate) fn from_parts(
        schema: FeatureType,
        store: Arc<dyn FeatureStore>,
        index: FeatureIndex,
        config: CacheConfig,
        has_overflow: bool,
        listeners: Vec<Box<dyn EvictionListener>>,
    ) -> Self {
        let mut subscribers = Listeners::default();
        for listener in listeners {
            subscribers.push(listener);
        }
        Self {
            schema,
            store,
            index,
            tracker: RegionTracker::new(config.max_residual_parts),
            listeners: subscribers,
            config,
            has_overflow,
            stats: CacheStats::default(),
            #[cfg(not(feature = "sync"))]
            _not_send_sync: PhantomData,
        }
    }

    /// Build a cache with default configuration for `type_name`.
    pub fn open(store: Arc<dyn FeatureStore>, type_name: &str) -> Result<Self> {
        crate::builder::CacheBuilder::new(store)
            .type_name(type_name)
            .build()
    }

    pub fn type_name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &FeatureType {
        &self.schema
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of features held in memory.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn cache_reads(&self) -> u64 {
        self.stats.cache_reads
    }

    pub fn store_reads(&self) -> u64 {
        self.stats.store_reads
    }

    pub fn evictions(&self) -> u64 {
        self.stats.evictions
    }

    /// Rectangles the cache currently claims to hold completely.
    pub fn tracked_regions(&self) -> Vec<Envelope> {
        self.tracker.regions()
    }

    pub fn is_covered(&self, envelope: &Envelope) -> bool {
        self.tracker.is_covered(envelope)
    }

    pub fn index(&self) -> &FeatureIndex {
        &self.index
    }

    /// Subscribe to eviction events. Subscribers run in registration order.
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: EvictionListener + 'static,
    {
        self.listeners.push(Box::new(listener));
        log::debug!(
            "cache of '{}' has {} eviction listener(s)",
            self.type_name(),
            self.listeners.len()
        );
    }

    /// Split `filter` into its cached, missing and remaining parts.
    ///
    /// Only a top-level bounding box (or the first bounding box of a
    /// top-level conjunction) is matched against tracked regions; any other
    /// filter is a total miss.
    pub fn split_filter(&self, filter: &Filter) -> SplitFilter {
        let (spatial, other) = filter.split_spatial();
        let Some(bbox) = spatial else {
            return SplitFilter {
                cached: Filter::Exclude,
                missing: Filter::Include,
                other,
            };
        };

        let spatial = Filter::BBox(bbox);
        let missing = self.tracker.match_filter(&spatial);
        let cached = if missing != spatial {
            spatial
        } else {
            Filter::Exclude
        };
        SplitFilter {
            cached,
            missing,
            other,
        }
    }

    /// Every feature of the cached type.
    pub fn all_features(&mut self) -> Result<FeatureCollection> {
        self.features(&Filter::Include)
    }

    /// Features matching `filter`, fetching from the store only what the
    /// tracked regions do not cover.
    pub fn features(&mut self, filter: &Filter) -> Result<FeatureCollection> {
        let type_name = self.schema.name().to_string();
        if filter.is_exclude() {
            return Ok(FeatureCollection::empty(type_name));
        }

        let split = self.split_filter(filter);
        let mut result = Vec::new();
        let mut seen = FxHashSet::default();

        if !split.cached.is_exclude() {
            for feature in self.index.select(&split.cached, filter) {
                seen.insert(feature.id().to_string());
                result.push(feature);
            }
            self.stats.cache_reads += 1;
        }

        if !split.missing.is_exclude() {
            let request = split.missing.clone().and(split.other.clone());
            let fetched = self.store.features(&type_name, &request)?;
            self.stats.store_reads += 1;
            log::debug!(
                "fetched {} '{}' feature(s) from store for {:?}",
                fetched.len(),
                type_name,
                request
            );

            for feature in fetched.iter() {
                if filter.evaluate(feature) && seen.insert(feature.id().to_string()) {
                    result.push(feature.clone());
                }
            }
            self.absorb(fetched, &split)?;
        }

        Ok(FeatureCollection::new(type_name, result))
    }

    /// Run `query` against the cache.
    pub fn query(&mut self, query: &Query) -> Result<FeatureCollection> {
        self.check_type(&query.type_name)?;
        let mut result = self.features(&query.filter)?;
        if let Some(max) = query.max_features {
            result.truncate(max);
        }
        Ok(result)
    }

    /// Look up a feature, going to the store on a miss.
    pub fn get(&mut self, id: &str) -> Result<Option<Feature>> {
        if let Some(feature) = self.index.peek(id) {
            let feature = feature.clone();
            self.stats.cache_reads += 1;
            return Ok(Some(feature));
        }

        if self.has_overflow
            && let Some(feature) = self.index.take_overflow(id)?
        {
            self.insert(feature.clone())?;
            self.stats.cache_reads += 1;
            return Ok(Some(feature));
        }

        let fetched = self.store.features(self.schema.name(), &Filter::id(id))?;
        self.stats.store_reads += 1;
        let found = fetched.into_iter().find(|f| f.id() == id);
        if let Some(feature) = &found {
            self.insert(feature.clone())?;
        }
        Ok(found)
    }

    /// Look up a feature in memory only.
    pub fn peek(&mut self, id: &str) -> Option<Feature> {
        let feature = self.index.peek(id).cloned();
        if feature.is_some() {
            self.stats.cache_reads += 1;
        }
        feature
    }

    /// Add a feature without going through the store. Registers no region.
    ///
    /// Returns `false` if a feature with the same id is already cached.
    pub fn put(&mut self, feature: Feature) -> Result<bool> {
        self.insert(feature)
    }

    /// Pre-warm the cache with `features`, declaring them the complete
    /// content of the area `filter` selects.
    pub fn put_all(&mut self, features: FeatureCollection, filter: &Filter) -> Result<usize> {
        if features.len() > self.capacity() {
            log::warn!(
                "rejecting batch of {} '{}' features, capacity is {}",
                features.len(),
                self.type_name(),
                self.capacity()
            );
            return Err(CacheError::CapacityExceeded {
                requested: features.len(),
                capacity: self.capacity(),
            });
        }

        self.tracker.register(filter);
        let mut inserted = 0;
        for feature in features {
            if self.insert(feature)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Drop a feature and revoke every region around it.
    pub fn remove(&mut self, id: &str) -> Result<Option<Feature>> {
        let Some(feature) = self.index.remove(id)? else {
            return Ok(None);
        };
        let envelope = *feature.envelope();
        self.tracker.unregister(&envelope);
        self.listeners.notify(&EvictionEvent {
            type_name: self.schema.name().to_string(),
            ids: vec![id.to_string()],
            envelope: Some(envelope),
            reason: EvictionReason::Removed,
        });
        Ok(Some(feature))
    }

    /// Run one round of the eviction policy. Returns the number of features
    /// dropped.
    pub fn evict(&mut self) -> Result<usize> {
        self.evict_once(EvictionReason::Manual)
    }

    /// Live read-only view of cached features matching `filter`.
    pub fn view(&self, filter: Filter) -> FeatureView<'_> {
        FeatureView::new(self.schema.name(), &self.index, filter)
    }

    /// Drop every feature and every tracked region. Counters are kept.
    pub fn clear(&mut self) -> Result<()> {
        self.tracker.clear();
        self.index.clear()
    }

    pub fn add_features(&mut self, _features: FeatureCollection) -> Result<Vec<String>> {
        Err(self.unsupported("add_features"))
    }

    pub fn modify_features(
        &mut self,
        _properties: &[(String, serde_json::Value)],
        _filter: &Filter,
    ) -> Result<()> {
        Err(self.unsupported("modify_features"))
    }

    pub fn remove_features(&mut self, _filter: &Filter) -> Result<()> {
        Err(self.unsupported("remove_features"))
    }

    pub fn set_features(&mut self, _features: FeatureCollection) -> Result<()> {
        Err(self.unsupported("set_features"))
    }

    fn unsupported(&self, operation: &'static str) -> CacheError {
        log::warn!(
            "rejected write '{}' on cache of '{}'",
            operation,
            self.type_name()
        );
        CacheError::Unsupported(operation)
    }

    fn check_type(&self, type_name: &str) -> Result<()> {
        if type_name != self.schema.name() {
            return Err(CacheError::TypeMismatch {
                expected: self.schema.name().to_string(),
                requested: type_name.to_string(),
            });
        }
        Ok(())
    }

    /// Cache a freshly fetched batch and claim its region.
    fn absorb(&mut self, fetched: FeatureCollection, split: &SplitFilter) -> Result<()> {
        if fetched.len() > self.capacity() {
            log::debug!(
                "not caching {} '{}' feature(s): batch exceeds capacity {}",
                fetched.len(),
                self.type_name(),
                self.capacity()
            );
            return Ok(());
        }

        // the region is claimed before insertion so evictions made room
        // for this batch revoke it again
        if split.other.is_include() {
            self.tracker.register(&split.missing);
        }
        for feature in fetched {
            self.insert(feature)?;
        }
        Ok(())
    }

    fn insert(&mut self, feature: Feature) -> Result<bool> {
        if self.index.contains(feature.id()) {
            return Ok(false);
        }
        self.make_room()?;
        self.index.add(feature)
    }

    /// Evict until one more feature fits.
    fn make_room(&mut self) -> Result<()> {
        while self.index.len() >= self.capacity() {
            if self.evict_once(EvictionReason::Capacity)? == 0 {
                return Err(CacheError::Index(format!(
                    "eviction freed no space in cache of '{}'",
                    self.type_name()
                )));
            }
        }
        Ok(())
    }

    fn evict_once(&mut self, reason: EvictionReason) -> Result<usize> {
        let victims = match self.config.eviction {
            EvictionPolicy::Lru => self.index.stalest_leaf(),
            EvictionPolicy::Random => self.index.random_id().and_then(|id| {
                let envelope = *self.index.peek(&id)?.envelope();
                Some((vec![id], envelope))
            }),
        };
        let Some((ids, envelope)) = victims else {
            return Ok(0);
        };

        let mut evicted = Vec::with_capacity(ids.len());
        for id in ids {
            if self.index.evict(&id)?.is_some() {
                evicted.push(id);
            }
        }
        let revoked = self.tracker.unregister(&envelope);
        self.stats.evictions += evicted.len() as u64;
        log::debug!(
            "evicted {} '{}' feature(s) ({:?}), revoked {} region(s)",
            evicted.len(),
            self.type_name(),
            reason,
            revoked
        );

        let count = evicted.len();
        self.listeners.notify(&EvictionEvent {
            type_name: self.schema.name().to_string(),
            ids: evicted,
            envelope: Some(envelope),
            reason,
        });
        Ok(count)
    }
}
