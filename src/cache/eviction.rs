//! Eviction policy and node access bookkeeping.

use crate::compute::spatial::{ArenaRTree, NodeId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// How a full cache picks what to drop.
///
/// The policy is fixed when the cache is built; a cache never mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Drop every feature of the least recently filled or searched index
    /// leaf and revoke the leaf's region.
    #[default]
    Lru,
    /// Drop one uniformly random feature and revoke the regions it touches.
    Random,
}

/// Access record of one index node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAccess {
    pub hits: u64,
    pub last_access: u64,
}

/// Side table of index node access times.
///
/// Time is a logical clock advanced on every touch. A node that was never
/// touched reads as accessed "now", which makes freshly built branches the
/// last candidates for eviction.
#[derive(Debug, Default)]
pub struct NodeAccessLog {
    clock: u64,
    entries: FxHashMap<NodeId, NodeAccess>,
}

impl NodeAccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.clock
    }

    /// Record a traversal of `node`.
    pub fn touch(&mut self, node: NodeId) {
        self.clock += 1;
        let clock = self.clock;
        let entry = self.entries.entry(node).or_insert(NodeAccess {
            hits: 0,
            last_access: clock,
        });
        entry.hits += 1;
        entry.last_access = clock;
    }

    pub fn get(&self, node: NodeId) -> Option<NodeAccess> {
        self.entries.get(&node).copied()
    }

    pub fn last_access(&self, node: NodeId) -> u64 {
        self.entries
            .get(&node)
            .map_or(self.clock, |access| access.last_access)
    }

    /// Forget nodes that no longer exist.
    pub fn purge(&mut self, nodes: &[NodeId]) {
        for node in nodes {
            self.entries.remove(node);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Walk from the root towards the stalest leaf.
///
/// At each branch the child with the oldest access wins; ties go to the
/// first child. Returns `None` for an empty tree.
pub fn stalest_leaf<T>(tree: &ArenaRTree<T>, log: &NodeAccessLog) -> Option<NodeId> {
    if tree.is_empty() {
        return None;
    }
    let mut node = tree.root();
    while !tree.is_leaf(node) {
        node = tree
            .children(node)
            .iter()
            .copied()
            .min_by_key(|child| log.last_access(*child))?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstar::AABB;

    fn tree_with_two_clusters() -> ArenaRTree<usize> {
        let mut tree = ArenaRTree::new(8);
        for i in 0..6 {
            let c = i as f64 * 0.1;
            tree.insert(AABB::from_point([c, c]), i);
        }
        for i in 6..12 {
            let c = 100.0 + i as f64 * 0.1;
            tree.insert(AABB::from_point([c, c]), i);
        }
        tree
    }

    #[test]
    fn test_touch_advances_clock() {
        let tree = tree_with_two_clusters();
        let mut log = NodeAccessLog::new();
        let root = tree.root();

        assert_eq!(log.last_access(root), 0);
        log.touch(root);
        log.touch(root);
        assert_eq!(log.get(root), Some(NodeAccess { hits: 2, last_access: 2 }));
        assert_eq!(log.now(), 2);
    }

    #[test]
    fn test_untouched_nodes_read_as_now() {
        let tree = tree_with_two_clusters();
        let mut log = NodeAccessLog::new();
        let child = tree.children(tree.root())[0];
        log.touch(child);
        log.touch(tree.root());
        assert_eq!(log.last_access(tree.children(tree.root())[1]), log.now());
        assert!(log.last_access(child) < log.now());
    }

    #[test]
    fn test_stalest_leaf_follows_oldest_branch() {
        let tree = tree_with_two_clusters();
        let mut log = NodeAccessLog::new();

        tree.search(&AABB::from_point([0.0, 0.0]), |id| log.touch(id));
        tree.search(&AABB::from_point([101.1, 101.1]), |id| log.touch(id));
        assert_eq!(tree.depth(), 2);

        let expected = tree
            .children(tree.root())
            .iter()
            .copied()
            .min_by_key(|child| log.last_access(*child))
            .unwrap();
        let leaf = stalest_leaf(&tree, &log).unwrap();
        assert!(tree.is_leaf(leaf));
        assert_eq!(leaf, expected);
        assert!(log.last_access(leaf) < log.now());
    }

    #[test]
    fn test_stalest_leaf_of_empty_tree() {
        let tree: ArenaRTree<usize> = ArenaRTree::new(4);
        assert!(stalest_leaf(&tree, &NodeAccessLog::new()).is_none());
    }

    #[test]
    fn test_purge() {
        let mut tree = tree_with_two_clusters();
        let mut log = NodeAccessLog::new();
        tree.search(&AABB::from_corners([-1.0, -1.0], [200.0, 200.0]), |id| log.touch(id));
        assert!(!log.is_empty());

        tree.clear();
        log.purge(&tree.take_freed());
        assert!(log.is_empty());
    }
}
