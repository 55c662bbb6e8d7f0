//! Error types for cache operations.

use thiserror::Error;

/// Errors reported by the cache, its stores and its indexes.
///
/// Every error is scoped to the operation that produced it; the cache stays
/// usable afterwards.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store does not publish the requested feature type.
    #[error("feature type '{0}' not found in backing store")]
    SchemaNotFound(String),

    /// The backing store's schema differs from the one the cache was built for.
    #[error("schema mismatch for feature type '{type_name}': {reason}")]
    SchemaMismatch { type_name: String, reason: String },

    /// Write-path operation invoked on the read-only cache.
    #[error("operation '{0}' is not supported by the cache; write to the backing store instead")]
    Unsupported(&'static str),

    /// The backing store failed while serving a request.
    #[error("store I/O failure: {0}")]
    StoreIo(String),

    /// The spatial index rejected an operation.
    #[error("spatial index failure: {0}")]
    Index(String),

    /// A query addressed a feature type this cache was not built for.
    #[error("query for feature type '{requested}' sent to cache of '{expected}'")]
    TypeMismatch { expected: String, requested: String },

    /// A batch cannot fit into the cache.
    #[error("batch of {requested} features exceeds cache capacity {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
