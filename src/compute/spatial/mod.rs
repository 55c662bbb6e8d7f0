//! Spatial indexing.

pub mod rtree;

pub use rtree::{ArenaRTree, Bounds, NodeId, from_bounds, to_bounds};
