//! # spatio-cache-types
//!
//! Plain data types shared by the spatio feature cache and the feature
//! stores it fronts:
//!
//! - **Envelope**: immutable axis-aligned rectangle with union, intersection,
//!   containment and rectangle difference
//! - **Feature types**: `Feature` and `FeatureCollection`
//! - **Schema types**: `FeatureType`, `AttributeDescriptor`, `AttributeBinding`
//!
//! Geometries are `geo` types; attributes are `serde_json` values.
//!
//! ## Examples
//!
//! ```rust
//! use spatio_cache_types::envelope::Envelope;
//! use spatio_cache_types::feature::Feature;
//!
//! let station = Feature::point("station.1", 13.37, 52.52);
//! let berlin = Envelope::new(13.08, 52.33, 13.76, 52.68);
//! assert!(berlin.contains(station.envelope()));
//! ```

pub mod envelope;
pub mod feature;
pub mod schema;
