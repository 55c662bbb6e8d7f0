//! Compute layer: spatial data structures used by the cache.
//!
//! Kept separate from the cache engine so the index structures carry no
//! knowledge of features, stores or eviction policy.

pub mod spatial;
