//! Cache builder.
//!
//! Wires a store, a feature type, configuration, storage and listeners into
//! a [`SpatialCache`], validating the schema against the store on the way.

use crate::cache::{EvictionListener, EvictionPolicy, FeatureIndex, SpatialCache};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::source::FeatureStore;
use crate::storage::{FeatureStorage, MemoryStorage};
use crate::types::FeatureType;
use std::sync::Arc;

/// Builder for [`SpatialCache`].
pub struct CacheBuilder {
    store: Arc<dyn FeatureStore>,
    type_name: Option<String>,
    schema: Option<FeatureType>,
    config: CacheConfig,
    overflow: Option<Box<dyn FeatureStorage>>,
    listeners: Vec<Box<dyn EvictionListener>>,
}

impl CacheBuilder {
    pub fn new(store: Arc<dyn FeatureStore>) -> Self {
        Self {
            store,
            type_name: None,
            schema: None,
            config: CacheConfig::default(),
            overflow: None,
            listeners: Vec::new(),
        }
    }

    /// Cache the store's feature type `name`, taking its schema from the store.
    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    /// Cache a feature type whose schema must match the store's exactly.
    pub fn schema(mut self, schema: FeatureType) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.with_capacity(capacity);
        self
    }

    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.config = self.config.with_eviction(policy);
        self
    }

    /// Keep evicted features in `overflow` and promote them back on `get`.
    pub fn overflow(mut self, overflow: Box<dyn FeatureStorage>) -> Self {
        self.overflow = Some(overflow);
        self
    }

    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: EvictionListener + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Build the cache.
    ///
    /// Fails with `SchemaNotFound` if the store does not publish the type and
    /// with `SchemaMismatch` if a requested schema differs from the store's.
    pub fn build(self) -> Result<SpatialCache> {
        self.config.validate().map_err(CacheError::InvalidConfig)?;

        let schema = match (self.schema, self.type_name) {
            (Some(requested), type_name) => {
                if let Some(name) = type_name
                    && name != requested.name()
                {
                    return Err(CacheError::InvalidInput(format!(
                        "type name '{}' does not match schema '{}'",
                        name,
                        requested.name()
                    )));
                }
                let actual = self.store.schema(requested.name())?;
                if let Some(reason) = schema_difference(&requested, &actual) {
                    log::warn!("schema mismatch for '{}': {}", requested.name(), reason);
                    return Err(CacheError::SchemaMismatch {
                        type_name: requested.name().to_string(),
                        reason,
                    });
                }
                requested
            }
            (None, Some(name)) => self.store.schema(&name)?,
            (None, None) => {
                return Err(CacheError::InvalidInput(
                    "a type name or schema is required".to_string(),
                ));
            }
        };

        let has_overflow = self.overflow.is_some();
        let mut storage = MemoryStorage::new(self.config.capacity);
        if let Some(overflow) = self.overflow {
            storage = storage.with_overflow(overflow);
        }
        let index = FeatureIndex::new(Box::new(storage), self.config.node_capacity);

        log::debug!(
            "built cache for '{}' (capacity {}, {:?} eviction)",
            schema.name(),
            self.config.capacity,
            self.config.eviction
        );
        Ok(SpatialCache::from_parts(
            schema,
            self.store,
            index,
            self.config,
            has_overflow,
            self.listeners,
        ))
    }
}

/// First difference between the requested and the published schema.
fn schema_difference(requested: &FeatureType, actual: &FeatureType) -> Option<String> {
    if requested == actual {
        return None;
    }
    if requested.geometry_property() != actual.geometry_property() {
        return Some(format!(
            "geometry property '{}' != '{}'",
            requested.geometry_property(),
            actual.geometry_property()
        ));
    }
    for attribute in requested.attributes() {
        match actual.attribute(&attribute.name) {
            None => return Some(format!("attribute '{}' missing from store", attribute.name)),
            Some(other) if other.binding != attribute.binding => {
                return Some(format!(
                    "attribute '{}' is {:?} in the store, {:?} requested",
                    attribute.name, other.binding, attribute.binding
                ));
            }
            Some(_) => {}
        }
    }
    Some("attribute lists differ".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryFeatureStore;
    use crate::types::AttributeBinding;

    fn store() -> Arc<MemoryFeatureStore> {
        let store = Arc::new(MemoryFeatureStore::new());
        store.create_type(
            FeatureType::new("roads", "geom").with_attribute("lanes", AttributeBinding::Integer),
        );
        store
    }

    #[test]
    fn test_build_by_type_name() {
        let cache = CacheBuilder::new(store())
            .type_name("roads")
            .capacity(64)
            .eviction(EvictionPolicy::Random)
            .build()
            .unwrap();
        assert_eq!(cache.type_name(), "roads");
        assert_eq!(cache.capacity(), 64);
        assert_eq!(cache.config().eviction, EvictionPolicy::Random);
        assert!(cache.schema().attribute("lanes").is_some());
    }

    #[test]
    fn test_unknown_type() {
        let result = CacheBuilder::new(store()).type_name("rivers").build();
        assert!(matches!(result, Err(CacheError::SchemaNotFound(name)) if name == "rivers"));
    }

    #[test]
    fn test_schema_mismatch() {
        let requested =
            FeatureType::new("roads", "geom").with_attribute("lanes", AttributeBinding::Text);
        let result = CacheBuilder::new(store()).schema(requested).build();
        match result {
            Err(CacheError::SchemaMismatch { type_name, reason }) => {
                assert_eq!(type_name, "roads");
                assert!(reason.contains("lanes"));
            }
            _ => panic!("expected schema mismatch"),
        }

        let requested = FeatureType::new("roads", "shape")
            .with_attribute("lanes", AttributeBinding::Integer);
        assert!(matches!(
            CacheBuilder::new(store()).schema(requested).build(),
            Err(CacheError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_matching_schema() {
        let requested =
            FeatureType::new("roads", "geom").with_attribute("lanes", AttributeBinding::Integer);
        assert!(CacheBuilder::new(store()).schema(requested).build().is_ok());
    }

    #[test]
    fn test_missing_type_and_invalid_config() {
        assert!(matches!(
            CacheBuilder::new(store()).build(),
            Err(CacheError::InvalidInput(_))
        ));

        let config = CacheConfig {
            node_capacity: 2,
            ..CacheConfig::default()
        };
        assert!(matches!(
            CacheBuilder::new(store()).type_name("roads").config(config).build(),
            Err(CacheError::InvalidConfig(_))
        ));
    }
}
