//! Cache configuration.
//!
//! Configuration is plain serde data so it can be loaded from JSON, TOML
//! (behind the `toml` feature) or built in code.

use crate::cache::eviction::EvictionPolicy;
use crate::error::{CacheError, Result};
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum fan-out of the feature index nodes.
pub const MIN_NODE_CAPACITY: usize = 4;

/// Configuration for a [`SpatialCache`](crate::SpatialCache).
///
/// # Example
///
/// ```rust
/// use spatio_cache::{CacheConfig, EvictionPolicy};
///
/// let config = CacheConfig::default().with_capacity(5_000);
/// assert_eq!(config.eviction, EvictionPolicy::Lru);
///
/// let json = r#"{ "capacity": 250, "eviction": "random" }"#;
/// let config = CacheConfig::from_json(json).unwrap();
/// assert_eq!(config.capacity, 250);
/// assert_eq!(config.eviction, EvictionPolicy::Random);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of features held in memory.
    #[serde(default = "CacheConfig::default_capacity")]
    pub capacity: usize,

    /// Victim selection once the cache is full. Fixed for the cache's lifetime.
    #[serde(default)]
    pub eviction: EvictionPolicy,

    /// Maximum entries per feature index node.
    #[serde(default = "CacheConfig::default_node_capacity")]
    pub node_capacity: usize,

    /// Residual rectangles sent to the store as a disjunction before they
    /// are collapsed into their bounding envelope.
    #[serde(default = "CacheConfig::default_max_residual_parts")]
    pub max_residual_parts: usize,
}

impl CacheConfig {
    const fn default_capacity() -> usize {
        1000
    }

    const fn default_node_capacity() -> usize {
        8
    }

    const fn default_max_residual_parts() -> usize {
        4
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Cache capacity must be greater than zero");
        self.capacity = capacity;
        self
    }

    pub fn with_eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    pub fn with_node_capacity(mut self, node_capacity: usize) -> Self {
        assert!(
            node_capacity >= MIN_NODE_CAPACITY,
            "Node capacity must be at least 4"
        );
        self.node_capacity = node_capacity;
        self
    }

    /// Allow up to `parts` residual rectangles per store request.
    /// `1` always collapses the residual to a single envelope.
    pub fn with_max_residual_parts(mut self, parts: usize) -> Self {
        assert!(parts > 0, "Residual parts must be greater than zero");
        self.max_residual_parts = parts;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.capacity == 0 {
            return Err("Cache capacity must be greater than zero".to_string());
        }
        if self.node_capacity < MIN_NODE_CAPACITY {
            return Err(format!(
                "Node capacity must be at least {}, got {}",
                MIN_NODE_CAPACITY, self.node_capacity
            ));
        }
        if self.max_residual_parts == 0 {
            return Err("Residual parts must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: CacheConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: CacheConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a `.json` or `.toml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::from_json(&contents)?),
            #[cfg(feature = "toml")]
            Some("toml") => {
                Self::from_toml(&contents).map_err(|e| CacheError::InvalidConfig(e.to_string()))
            }
            other => Err(CacheError::InvalidConfig(format!(
                "unsupported configuration format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            eviction: EvictionPolicy::default(),
            node_capacity: Self::default_node_capacity(),
            max_residual_parts: Self::default_max_residual_parts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.eviction, EvictionPolicy::Lru);
        assert_eq!(config.node_capacity, 8);
        assert_eq!(config.max_residual_parts, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_fields_use_defaults() {
        let config = CacheConfig::from_json(r#"{ "capacity": 10 }"#).unwrap();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.node_capacity, 8);
    }

    #[test]
    fn test_json_rejects_invalid_values() {
        assert!(CacheConfig::from_json(r#"{ "capacity": 0 }"#).is_err());
        assert!(CacheConfig::from_json(r#"{ "node_capacity": 2 }"#).is_err());
        assert!(CacheConfig::from_json(r#"{ "ttl": 5 }"#).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = CacheConfig::default()
            .with_capacity(42)
            .with_eviction(EvictionPolicy::Random)
            .with_max_residual_parts(1);
        let json = config.to_json().unwrap();
        assert_eq!(CacheConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    #[should_panic(expected = "Node capacity must be at least 4")]
    fn test_node_capacity_assert() {
        let _ = CacheConfig::default().with_node_capacity(3);
    }

    #[test]
    fn test_from_file_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "capacity": 77, "eviction": "lru" }}"#).unwrap();
        let config = CacheConfig::from_file(file.path()).unwrap();
        assert_eq!(config.capacity, 77);
    }

    #[test]
    fn test_from_file_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            CacheConfig::from_file(file.path()),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_roundtrip() {
        let config = CacheConfig::default().with_capacity(12);
        let toml_str = config.to_toml().unwrap();
        assert_eq!(CacheConfig::from_toml(&toml_str).unwrap(), config);
    }
}
