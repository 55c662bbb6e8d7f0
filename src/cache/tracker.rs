//! Region tracker.
//!
//! Remembers which rectangles of the plane the cache holds completely, and
//! rewrites bounding-box requests into the part that still has to come from
//! the store.

use crate::compute::spatial::to_bounds;
use crate::filter::{BBoxFilter, Filter};
use crate::types::Envelope;
use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::Hasher;

/// A registered rectangle, indexed by its bounds.
#[derive(Debug, Clone, PartialEq)]
struct TrackedRegion {
    key: u64,
    envelope: Envelope,
    srs: Option<String>,
}

impl RTreeObject for TrackedRegion {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        to_bounds(&self.envelope)
    }
}

fn region_key(envelope: &Envelope, srs: Option<&str>) -> u64 {
    let mut hasher = FxHasher::default();
    if let Some(srs) = srs {
        hasher.write(srs.as_bytes());
    }
    for value in [
        envelope.min_x(),
        envelope.min_y(),
        envelope.max_x(),
        envelope.max_y(),
    ] {
        hasher.write_u64(value.to_bits());
    }
    hasher.finish()
}

/// Tracks rectangles whose features are all present in the cache.
///
/// Only bounding-box predicates are tracked. Any other filter is reported
/// back unchanged by [`match_filter`](Self::match_filter), i.e. as a total
/// miss. Regions only answer boxes in the reference system they were
/// registered with.
pub struct RegionTracker {
    index: RTree<TrackedRegion>,
    regions: FxHashMap<u64, TrackedRegion>,
    max_residual_parts: usize,
}

impl RegionTracker {
    /// `max_residual_parts` bounds how many rectangles a residual may be
    /// split into before it is collapsed into its bounding envelope.
    pub fn new(max_residual_parts: usize) -> Self {
        Self {
            index: RTree::new(),
            regions: FxHashMap::default(),
            max_residual_parts: max_residual_parts.max(1),
        }
    }

    /// Rewrite `filter` into the part not yet covered by tracked regions.
    ///
    /// - non-bbox filter: returned unchanged
    /// - no overlapping region: returned unchanged
    /// - fully covered: [`Filter::Exclude`]
    /// - partially covered: a bbox (or `Or` of bboxes) over the residual
    pub fn match_filter(&self, filter: &Filter) -> Filter {
        match filter {
            Filter::BBox(bbox) => self.match_bbox(bbox).unwrap_or_else(|| filter.clone()),
            _ => filter.clone(),
        }
    }

    /// Residual of `bbox`, or `None` if no tracked region removes anything.
    fn match_bbox(&self, bbox: &BBoxFilter) -> Option<Filter> {
        let query = bbox.envelope;
        let mut foreign = 0;
        let mut hits: Vec<Envelope> = self
            .index
            .locate_in_envelope_intersecting(&to_bounds(&query))
            .filter(|region| {
                let same = region.srs == bbox.srs;
                foreign += usize::from(!same);
                same
            })
            .map(|region| region.envelope)
            .collect();
        if foreign > 0 {
            log::debug!(
                "ignoring {} region(s) tracked in another reference system than {:?}",
                foreign,
                bbox.srs
            );
        }
        if hits.is_empty() {
            return None;
        }
        if hits.iter().any(|hit| hit.contains(&query)) {
            return Some(Filter::Exclude);
        }

        hits.sort_by(|a, b| b.area().total_cmp(&a.area()));

        let mut pieces = vec![query];
        for hit in &hits {
            pieces = pieces
                .into_iter()
                .flat_map(|piece| piece.difference(hit))
                .collect();
            if pieces.is_empty() {
                return Some(Filter::Exclude);
            }
        }

        if pieces.len() == 1 && pieces[0] == query {
            return None;
        }

        let residual = if pieces.len() > self.max_residual_parts {
            let bounds = Envelope::bounds_of(pieces.iter()).unwrap_or(query);
            Filter::BBox(bbox.with_envelope(bounds))
        } else if pieces.len() == 1 {
            Filter::BBox(bbox.with_envelope(pieces[0]))
        } else {
            Filter::Or(
                pieces
                    .into_iter()
                    .map(|piece| Filter::BBox(bbox.with_envelope(piece)))
                    .collect(),
            )
        };
        Some(residual)
    }

    /// Whether `envelope` is entirely covered by regions registered without
    /// an explicit reference system.
    pub fn is_covered(&self, envelope: &Envelope) -> bool {
        self.match_bbox(&BBoxFilter::new("", *envelope))
            .is_some_and(|f| f.is_exclude())
    }

    /// Record the spatial parts of `filter` as fully cached.
    ///
    /// Returns the number of new regions. Filters that are not bounding
    /// boxes (or an `Or` of them) are not tracked.
    pub fn register(&mut self, filter: &Filter) -> usize {
        let Some(parts) = bbox_parts(filter) else {
            return 0;
        };
        parts
            .into_iter()
            .filter(|bbox| self.register_bbox(bbox))
            .count()
    }

    /// Record one rectangle. Returns `false` if it was already tracked.
    pub fn register_bbox(&mut self, bbox: &BBoxFilter) -> bool {
        let envelope = bbox.envelope;
        let mut key = region_key(&envelope, bbox.srs.as_deref());
        while let Some(existing) = self.regions.get(&key) {
            if existing.envelope == envelope && existing.srs == bbox.srs {
                return false;
            }
            key = key.wrapping_add(1);
        }

        log::debug!("tracking region {:?} under key {:#x}", envelope, key);
        let region = TrackedRegion {
            key,
            envelope,
            srs: bbox.srs.clone(),
        };
        self.regions.insert(key, region.clone());
        self.index.insert(region);
        true
    }

    /// Revoke every region intersecting `envelope`. Returns how many were removed.
    pub fn unregister(&mut self, envelope: &Envelope) -> usize {
        let hits: Vec<TrackedRegion> = self
            .index
            .locate_in_envelope_intersecting(&to_bounds(envelope))
            .cloned()
            .collect();

        for region in &hits {
            self.index.remove(region);
            self.regions.remove(&region.key);
        }
        if !hits.is_empty() {
            log::debug!("revoked {} region(s) intersecting {:?}", hits.len(), envelope);
        }
        hits.len()
    }

    /// Revoke the regions intersecting each spatial part of `filter`, in any
    /// reference system.
    pub fn unregister_filter(&mut self, filter: &Filter) -> usize {
        filter
            .spatial_parts()
            .map_or(0, |parts| parts.iter().map(|e| self.unregister(e)).sum())
    }

    /// Currently tracked rectangles.
    pub fn regions(&self) -> Vec<Envelope> {
        self.regions.values().map(|region| region.envelope).collect()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn clear(&mut self) {
        self.index = RTree::new();
        self.regions.clear();
    }
}

/// The boxes of a bbox or of an `Or` made only of bboxes.
fn bbox_parts(filter: &Filter) -> Option<Vec<&BBoxFilter>> {
    match filter {
        Filter::BBox(bbox) => Some(vec![bbox]),
        Filter::Or(parts) if !parts.is_empty() => parts.iter().map(Filter::as_bbox).collect(),
        _ => None,
    }
}
