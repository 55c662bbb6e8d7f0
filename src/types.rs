//! Feature data types.
//!
//! Re-exported from `spatio-cache-types` so cache users need a single
//! dependency.

pub use spatio_cache_types::envelope::Envelope;
pub use spatio_cache_types::feature::{Feature, FeatureCollection};
pub use spatio_cache_types::schema::{AttributeBinding, AttributeDescriptor, FeatureType};
