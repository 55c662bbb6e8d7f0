//! Spatial result cache for geospatial feature stores.
//!
//! A [`SpatialCache`] sits in front of one feature type of a
//! [`FeatureStore`]. It remembers which rectangles it has fetched completely,
//! answers later bounding-box queries inside them from memory and fetches
//! only the uncovered remainder from the store.
//!
//! ```rust
//! use spatio_cache::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryFeatureStore::new());
//! store.create_type(FeatureType::new("trees", "geom"));
//! store.insert("trees", Feature::point("oak", 2.0, 3.0))?;
//!
//! let mut cache = SpatialCache::open(store, "trees")?;
//! let found = cache.features(&Filter::bbox("geom", 0.0, 0.0, 10.0, 10.0))?;
//! assert_eq!(found.ids(), vec!["oak"]);
//! assert!(cache.is_covered(&Envelope::new(1.0, 1.0, 5.0, 5.0)));
//! # Ok::<(), spatio_cache::CacheError>(())
//! ```

pub mod builder;
pub mod cache;
pub mod compute;
pub mod config;
pub mod error;
pub mod filter;
pub mod query;
pub mod registry;
pub mod source;
pub mod storage;
pub mod types;

#[cfg(feature = "geojson")]
pub mod geojson;

pub use builder::CacheBuilder;
pub use cache::{
    CacheStats, EvictionEvent, EvictionListener, EvictionPolicy, EvictionReason, FeatureIndex,
    FeatureView, RegionTracker, SpatialCache, SplitFilter,
};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use filter::{BBoxFilter, Filter, Predicate};
pub use query::Query;
pub use registry::StoreCache;
pub use source::{FeatureStore, MemoryFeatureStore};
pub use storage::{FeatureStorage, MemoryStorage, StorageStats};
pub use types::{
    AttributeBinding, AttributeDescriptor, Envelope, Feature, FeatureCollection, FeatureType,
};

#[cfg(feature = "sync")]
pub use cache::SyncSpatialCache;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{CacheBuilder, CacheConfig, CacheError, Result, SpatialCache, StoreCache};

    pub use crate::{Envelope, Feature, FeatureCollection, FeatureType};

    pub use crate::{Filter, Query};

    pub use crate::{EvictionEvent, EvictionPolicy, EvictionReason};

    pub use crate::{FeatureStore, MemoryFeatureStore};

    #[cfg(feature = "sync")]
    pub use crate::SyncSpatialCache;
}
