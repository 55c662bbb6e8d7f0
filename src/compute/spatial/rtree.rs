//! Arena-backed R-tree with addressable nodes.
//!
//! `rstar::RTree` hides its nodes, which is fine for plain range queries but
//! not for the feature index: least-recently-used eviction has to annotate
//! individual tree nodes with access times and walk from the root to the
//! stalest leaf. This tree keeps every node in a slot of a `Vec` and hands
//! out generational [`NodeId`] handles, so side tables can key off nodes
//! without borrowing the tree.
//!
//! Node bounds reuse `rstar`'s `AABB` and `Envelope` algebra.
//!
//! ## Structure
//!
//! - Guttman insertion with least-enlargement descent
//! - Quadratic split when a node exceeds `max_entries`
//! - Removal condenses under-filled nodes, reinserting their entries, and
//!   collapses single-child roots
//!
//! A node id is never reused with the same generation, so a stale id held by
//! a side table is detected by [`ArenaRTree::is_live`]. Ids of nodes freed
//! since the last call are available from [`ArenaRTree::take_freed`].

use crate::types::Envelope;
use rstar::{AABB, Envelope as _};
use smallvec::{SmallVec, smallvec};

/// Node and entry bounds.
pub type Bounds = AABB<[f64; 2]>;

/// Convert an envelope into R-tree bounds.
pub fn to_bounds(envelope: &Envelope) -> Bounds {
    AABB::from_corners(
        [envelope.min_x(), envelope.min_y()],
        [envelope.max_x(), envelope.max_y()],
    )
}

/// Convert R-tree bounds into an envelope.
pub fn from_bounds(bounds: &Bounds) -> Envelope {
    let lower = bounds.lower();
    let upper = bounds.upper();
    Envelope::new(lower[0], lower[1], upper[0], upper[1])
}

/// Generational handle to a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

type Children = SmallVec<[NodeId; 8]>;

#[derive(Debug)]
enum NodeKind<T> {
    Leaf(Vec<(Bounds, T)>),
    Branch(Children),
}

#[derive(Debug)]
struct Node<T> {
    bounds: Bounds,
    parent: Option<NodeId>,
    kind: NodeKind<T>,
}

impl<T> Node<T> {
    fn empty_leaf(parent: Option<NodeId>) -> Self {
        Self {
            bounds: Bounds::new_empty(),
            parent,
            kind: NodeKind::Leaf(Vec::new()),
        }
    }

    fn entry_count(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(entries) => entries.len(),
            NodeKind::Branch(children) => children.len(),
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    live: bool,
    node: Node<T>,
}

/// R-tree over `(Bounds, T)` entries with addressable nodes.
#[derive(Debug)]
pub struct ArenaRTree<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    freed: Vec<NodeId>,
    root: NodeId,
    len: usize,
    depth: usize,
    max_entries: usize,
    min_entries: usize,
}

impl<T> ArenaRTree<T> {
    /// Create an empty tree whose nodes hold at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        assert!(max_entries >= 4, "R-tree node capacity must be at least 4");
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            freed: Vec::new(),
            root: NodeId {
                slot: 0,
                generation: 0,
            },
            len: 0,
            depth: 1,
            max_entries,
            min_entries: (max_entries * 2 / 5).max(2),
        };
        tree.root = tree.alloc(Node::empty_leaf(None));
        tree
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of node levels, `1` for a tree whose root is a leaf.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Whether `id` still refers to a node of this tree.
    pub fn is_live(&self, id: NodeId) -> bool {
        self.slots
            .get(id.slot as usize)
            .is_some_and(|s| s.live && s.generation == id.generation)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.live_node(id)
            .is_some_and(|n| matches!(n.kind, NodeKind::Leaf(_)))
    }

    /// Child nodes of a branch. Empty for leaves and stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.live_node(id).map(|n| &n.kind) {
            Some(NodeKind::Branch(children)) => children.as_slice(),
            _ => &[],
        }
    }

    /// Entries of a leaf. Empty for branches and stale ids.
    pub fn leaf_items(&self, id: NodeId) -> impl Iterator<Item = (&Bounds, &T)> {
        let entries: &[(Bounds, T)] = match self.live_node(id).map(|n| &n.kind) {
            Some(NodeKind::Leaf(entries)) => entries,
            _ => &[],
        };
        entries.iter().map(|(b, t)| (b, t))
    }

    pub fn node_bounds(&self, id: NodeId) -> Option<Bounds> {
        self.live_node(id).map(|n| n.bounds)
    }

    /// Ids of nodes released since the previous call.
    pub fn take_freed(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.freed)
    }

    /// Insert an entry.
    pub fn insert(&mut self, bounds: Bounds, item: T) {
        let leaf = self.choose_leaf(&bounds);
        if let NodeKind::Leaf(entries) = &mut self.node_mut(leaf).kind {
            entries.push((bounds, item));
        }
        self.len += 1;
        self.adjust_upwards(leaf);
    }

    /// Remove the first entry within `bounds` accepted by `matches`.
    pub fn remove<F>(&mut self, bounds: &Bounds, mut matches: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if !node.bounds.contains_envelope(bounds) {
                continue;
            }
            match &node.kind {
                NodeKind::Branch(children) => stack.extend(children.iter().copied()),
                NodeKind::Leaf(entries) => {
                    let position = entries
                        .iter()
                        .position(|(b, item)| b.contains_envelope(bounds) && matches(item));
                    if let Some(index) = position {
                        let removed = match &mut self.node_mut(id).kind {
                            NodeKind::Leaf(entries) => entries.swap_remove(index).1,
                            NodeKind::Branch(_) => continue,
                        };
                        self.len -= 1;
                        self.condense(id);
                        return Some(removed);
                    }
                }
            }
        }
        None
    }

    /// Entries intersecting `bounds`. `touch` is called for every node the
    /// search descends into, root included.
    pub fn search<F>(&self, bounds: &Bounds, mut touch: F) -> Vec<&T>
    where
        F: FnMut(NodeId),
    {
        let mut results = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if !node.bounds.intersects(bounds) {
                continue;
            }
            touch(id);
            match &node.kind {
                NodeKind::Branch(children) => stack.extend(children.iter().copied()),
                NodeKind::Leaf(entries) => results.extend(
                    entries
                        .iter()
                        .filter(|(b, _)| b.intersects(bounds))
                        .map(|(_, item)| item),
                ),
            }
        }
        results
    }

    pub fn locate_in_envelope_intersecting(&self, bounds: &Bounds) -> Vec<&T> {
        self.search(bounds, |_| {})
    }

    /// Every entry, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bounds, &T)> {
        self.slots
            .iter()
            .filter(|s| s.live)
            .flat_map(|s| match &s.node.kind {
                NodeKind::Leaf(entries) => entries.as_slice(),
                NodeKind::Branch(_) => &[],
            })
            .map(|(b, t)| (b, t))
    }

    /// Drop every entry and node. Released ids are reported by `take_freed`.
    pub fn clear(&mut self) {
        let live: Vec<NodeId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.live)
            .map(|(i, s)| NodeId {
                slot: i as u32,
                generation: s.generation,
            })
            .collect();
        for id in live {
            self.release(id);
        }
        self.len = 0;
        self.depth = 1;
        self.root = self.alloc(Node::empty_leaf(None));
    }

    fn live_node(&self, id: NodeId) -> Option<&Node<T>> {
        self.slots
            .get(id.slot as usize)
            .filter(|s| s.live && s.generation == id.generation)
            .map(|s| &s.node)
    }

    fn node(&self, id: NodeId) -> &Node<T> {
        &self.slots[id.slot as usize].node
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        &mut self.slots[id.slot as usize].node
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.live = true;
            entry.node = node;
            return NodeId {
                slot,
                generation: entry.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            live: true,
            node,
        });
        NodeId {
            slot: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    fn release(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.slot as usize];
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.node = Node::empty_leaf(None);
        self.free.push(id.slot);
        self.freed.push(id);
    }

    fn refresh_bounds(&mut self, id: NodeId) {
        let bounds = match &self.node(id).kind {
            NodeKind::Leaf(entries) => entries
                .iter()
                .fold(Bounds::new_empty(), |acc, (b, _)| acc.merged(b)),
            NodeKind::Branch(children) => children
                .iter()
                .fold(Bounds::new_empty(), |acc, c| acc.merged(&self.node(*c).bounds)),
        };
        self.node_mut(id).bounds = bounds;
    }

    fn choose_leaf(&self, bounds: &Bounds) -> NodeId {
        let mut id = self.root;
        while let NodeKind::Branch(children) = &self.node(id).kind {
            let mut best: Option<(NodeId, f64, f64)> = None;
            for &child in children {
                let child_bounds = self.node(child).bounds;
                let area = child_bounds.area();
                let enlargement = child_bounds.merged(bounds).area() - area;
                let better = match best {
                    None => true,
                    Some((_, best_enlargement, best_area)) => {
                        enlargement < best_enlargement
                            || (enlargement == best_enlargement && area < best_area)
                    }
                };
                if better {
                    best = Some((child, enlargement, area));
                }
            }
            match best {
                Some((child, _, _)) => id = child,
                None => break,
            }
        }
        id
    }

    fn adjust_upwards(&mut self, start: NodeId) {
        let mut id = start;
        loop {
            if self.node(id).entry_count() > self.max_entries {
                self.split(id);
            } else {
                self.refresh_bounds(id);
            }
            match self.node(id).parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
    }

    fn split(&mut self, id: NodeId) {
        let parent = self.node(id).parent;
        let kind = std::mem::replace(
            &mut self.node_mut(id).kind,
            NodeKind::Branch(Children::new()),
        );

        let (kept, moved) = match kind {
            NodeKind::Leaf(entries) => {
                let (a, b) = quadratic_split(entries, |(bounds, _)| *bounds, self.min_entries);
                (NodeKind::Leaf(a), NodeKind::Leaf(b))
            }
            NodeKind::Branch(children) => {
                let with_bounds: Vec<(Bounds, NodeId)> = children
                    .into_iter()
                    .map(|c| (self.node(c).bounds, c))
                    .collect();
                let (a, b) = quadratic_split(with_bounds, |(bounds, _)| *bounds, self.min_entries);
                (
                    NodeKind::Branch(a.into_iter().map(|(_, c)| c).collect()),
                    NodeKind::Branch(b.into_iter().map(|(_, c)| c).collect()),
                )
            }
        };

        self.node_mut(id).kind = kept;
        self.refresh_bounds(id);

        let sibling = self.alloc(Node {
            bounds: Bounds::new_empty(),
            parent,
            kind: moved,
        });
        if let NodeKind::Branch(children) = &self.node(sibling).kind {
            let children = children.clone();
            for child in children {
                self.node_mut(child).parent = Some(sibling);
            }
        }
        self.refresh_bounds(sibling);

        match parent {
            Some(parent) => {
                if let NodeKind::Branch(children) = &mut self.node_mut(parent).kind {
                    children.push(sibling);
                }
            }
            None => {
                let root = self.alloc(Node {
                    bounds: Bounds::new_empty(),
                    parent: None,
                    kind: NodeKind::Branch(smallvec![id, sibling]),
                });
                self.node_mut(id).parent = Some(root);
                self.node_mut(sibling).parent = Some(root);
                self.refresh_bounds(root);
                self.root = root;
                self.depth += 1;
            }
        }
    }

    fn condense(&mut self, leaf: NodeId) {
        let mut orphans = Vec::new();
        let mut id = leaf;
        while let Some(parent) = self.node(id).parent {
            if self.node(id).entry_count() < self.min_entries {
                if let NodeKind::Branch(children) = &mut self.node_mut(parent).kind {
                    children.retain(|c| *c != id);
                }
                self.drain_subtree(id, &mut orphans);
            } else {
                self.refresh_bounds(id);
            }
            id = parent;
        }
        self.refresh_bounds(self.root);

        loop {
            let root = self.root;
            let only_child = match &self.node(root).kind {
                NodeKind::Branch(children) if children.len() == 1 => Some(children[0]),
                NodeKind::Branch(children) if children.is_empty() => None,
                _ => break,
            };
            match only_child {
                Some(child) => {
                    self.node_mut(child).parent = None;
                    self.release(root);
                    self.root = child;
                    self.depth -= 1;
                }
                None => {
                    self.node_mut(root).kind = NodeKind::Leaf(Vec::new());
                    self.node_mut(root).bounds = Bounds::new_empty();
                    self.depth = 1;
                    break;
                }
            }
        }

        self.len -= orphans.len();
        for (bounds, item) in orphans {
            self.insert(bounds, item);
        }
    }

    fn drain_subtree(&mut self, id: NodeId, out: &mut Vec<(Bounds, T)>) {
        let kind = std::mem::replace(&mut self.node_mut(id).kind, NodeKind::Leaf(Vec::new()));
        match kind {
            NodeKind::Leaf(entries) => out.extend(entries),
            NodeKind::Branch(children) => {
                for child in children {
                    self.drain_subtree(child, out);
                }
            }
        }
        self.release(id);
    }
}

/// Guttman's quadratic split.
fn quadratic_split<E, F>(mut entries: Vec<E>, bounds_of: F, min_entries: usize) -> (Vec<E>, Vec<E>)
where
    F: Fn(&E) -> Bounds,
{
    let (mut seed_a, mut seed_b) = (0, 1);
    let mut worst = f64::NEG_INFINITY;
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let a = bounds_of(&entries[i]);
            let b = bounds_of(&entries[j]);
            let waste = a.merged(&b).area() - a.area() - b.area();
            if waste > worst {
                worst = waste;
                seed_a = i;
                seed_b = j;
            }
        }
    }

    // seed_b > seed_a, remove the higher index first
    let second = entries.swap_remove(seed_b);
    let first = entries.swap_remove(seed_a);
    let mut bounds_a = bounds_of(&first);
    let mut bounds_b = bounds_of(&second);
    let mut group_a = vec![first];
    let mut group_b = vec![second];

    while !entries.is_empty() {
        if group_a.len() + entries.len() <= min_entries {
            group_a.append(&mut entries);
            break;
        }
        if group_b.len() + entries.len() <= min_entries {
            group_b.append(&mut entries);
            break;
        }

        let mut pick = 0;
        let mut max_preference = f64::NEG_INFINITY;
        for (i, entry) in entries.iter().enumerate() {
            let b = bounds_of(entry);
            let d_a = bounds_a.merged(&b).area() - bounds_a.area();
            let d_b = bounds_b.merged(&b).area() - bounds_b.area();
            let preference = (d_a - d_b).abs();
            if preference > max_preference {
                max_preference = preference;
                pick = i;
            }
        }

        let entry = entries.swap_remove(pick);
        let b = bounds_of(&entry);
        let d_a = bounds_a.merged(&b).area() - bounds_a.area();
        let d_b = bounds_b.merged(&b).area() - bounds_b.area();
        let to_a = if d_a != d_b {
            d_a < d_b
        } else if bounds_a.area() != bounds_b.area() {
            bounds_a.area() < bounds_b.area()
        } else {
            group_a.len() <= group_b.len()
        };

        if to_a {
            bounds_a = bounds_a.merged(&b);
            group_a.push(entry);
        } else {
            bounds_b = bounds_b.merged(&b);
            group_b.push(entry);
        }
    }

    (group_a, group_b)
}
