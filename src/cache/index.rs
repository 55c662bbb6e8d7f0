//! Feature spatial index.
//!
//! Pairs an [`ArenaRTree`] of feature ids with the feature storage that owns
//! the features themselves, and keeps the node access log the LRU policy
//! walks.

use crate::cache::eviction::{NodeAccessLog, stalest_leaf};
use crate::compute::spatial::{ArenaRTree, Bounds, NodeId, from_bounds, to_bounds};
use crate::error::Result;
use crate::filter::Filter;
use crate::storage::FeatureStorage;
use crate::types::{Envelope, Feature};
use rustc_hash::FxHashSet;

/// Spatially indexed feature table.
pub struct FeatureIndex {
    tree: ArenaRTree<String>,
    storage: Box<dyn FeatureStorage>,
    access: NodeAccessLog,
}

impl FeatureIndex {
    pub fn new(storage: Box<dyn FeatureStorage>, node_capacity: usize) -> Self {
        Self {
            tree: ArenaRTree::new(node_capacity),
            storage,
            access: NodeAccessLog::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.storage.contains(id)
    }

    pub fn storage(&self) -> &dyn FeatureStorage {
        &*self.storage
    }

    pub fn tree(&self) -> &ArenaRTree<String> {
        &self.tree
    }

    pub fn access_log(&self) -> &NodeAccessLog {
        &self.access
    }

    /// Index and store `feature`. Returns `false` if the id is already present.
    pub fn add(&mut self, feature: Feature) -> Result<bool> {
        if self.storage.contains(feature.id()) {
            return Ok(false);
        }
        let bounds = to_bounds(feature.envelope());
        let id = feature.id().to_string();

        if let Some(displaced) = self.storage.put(feature)? {
            self.unindex(&displaced);
        }
        self.tree.insert(bounds, id);
        self.sync_access_log();
        self.touch_path(&bounds);
        Ok(true)
    }

    /// Drop a feature from the index and the storage.
    pub fn remove(&mut self, id: &str) -> Result<Option<Feature>> {
        let removed = self.storage.remove(id)?;
        if let Some(feature) = &removed {
            self.unindex(feature);
        }
        Ok(removed)
    }

    /// Drop a feature as an eviction victim. The storage may keep it in its
    /// overflow.
    pub fn evict(&mut self, id: &str) -> Result<Option<Feature>> {
        let evicted = self.storage.evict(id)?;
        if let Some(feature) = &evicted {
            self.unindex(feature);
        }
        Ok(evicted)
    }

    pub fn peek(&self, id: &str) -> Option<&Feature> {
        self.storage.peek(id)
    }

    /// Take `id` out of the storage's overflow chain. The caller re-adds it
    /// once it has made room.
    pub fn take_overflow(&mut self, id: &str) -> Result<Option<Feature>> {
        if self.storage.contains(id) {
            return Ok(None);
        }
        self.storage.take_overflow(id)
    }

    /// Features whose envelope intersects the spatial part of `candidates`
    /// and which satisfy `predicate`.
    ///
    /// Nodes traversed on the way are marked as accessed. A non-spatial
    /// `candidates` filter scans every stored feature.
    pub fn select(&mut self, candidates: &Filter, predicate: &Filter) -> Vec<Feature> {
        let Self {
            tree,
            storage,
            access,
        } = self;
        collect(tree, &**storage, candidates, predicate, |node| {
            access.touch(node)
        })
    }

    /// Like [`select`](Self::select) but leaves access times untouched.
    pub fn select_untracked(&self, candidates: &Filter, predicate: &Filter) -> Vec<Feature> {
        collect(
            &self.tree,
            &*self.storage,
            candidates,
            predicate,
            |_| {},
        )
    }

    /// Ids in the least recently searched leaf, with the leaf's bounds.
    pub fn stalest_leaf(&self) -> Option<(Vec<String>, Envelope)> {
        let leaf = stalest_leaf(&self.tree, &self.access)?;
        let bounds = self.tree.node_bounds(leaf)?;
        let ids: Vec<String> = self.tree.leaf_items(leaf).map(|(_, id)| id.clone()).collect();
        if ids.is_empty() {
            return None;
        }
        Some((ids, from_bounds(&bounds)))
    }

    pub fn random_id(&self) -> Option<String> {
        self.storage.random_id()
    }

    pub fn all(&self) -> Vec<Feature> {
        self.storage.all()
    }

    pub fn bounds(&self) -> Option<Envelope> {
        let root = self.tree.root();
        if self.tree.is_empty() {
            return None;
        }
        self.tree.node_bounds(root).map(|b| from_bounds(&b))
    }

    /// Empty the tree and the storage.
    pub fn clear(&mut self) -> Result<()> {
        self.tree.clear();
        self.tree.take_freed();
        self.access.clear();
        self.storage.clear()
    }

    fn unindex(&mut self, feature: &Feature) {
        let bounds = to_bounds(feature.envelope());
        self.tree.remove(&bounds, |item| item == feature.id());
        self.sync_access_log();
    }

    /// A freshly filled leaf counts as used.
    fn touch_path(&mut self, bounds: &Bounds) {
        let Self { tree, access, .. } = self;
        tree.search(bounds, |node| access.touch(node));
    }

    fn sync_access_log(&mut self) {
        let freed = self.tree.take_freed();
        if !freed.is_empty() {
            self.access.purge(&freed);
        }
    }
}

fn collect<F>(
    tree: &ArenaRTree<String>,
    storage: &dyn FeatureStorage,
    candidates: &Filter,
    predicate: &Filter,
    mut touch: F,
) -> Vec<Feature>
where
    F: FnMut(NodeId),
{
    if candidates.is_exclude() || predicate.is_exclude() {
        return Vec::new();
    }

    let Some(parts) = candidates.spatial_parts() else {
        return storage
            .iter()
            .filter(|f| candidates.evaluate(f) && predicate.evaluate(f))
            .cloned()
            .collect();
    };

    let mut seen = FxHashSet::default();
    let mut features = Vec::new();
    for part in parts {
        for id in tree.search(&to_bounds(&part), &mut touch) {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if let Some(feature) = storage.peek(id)
                && predicate.evaluate(feature)
            {
                features.push(feature.clone());
            }
        }
    }
    features
}
