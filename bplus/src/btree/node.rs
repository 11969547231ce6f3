//! B+tree node types and the arena that owns them.
//!
//! Nodes never hold references to each other. Parent links, child lists and
//! the leaf chain are all [`NodeId`] handles into a [`NodeArena`], so the
//! tree can walk upward and sideways without shared ownership.
//!
//! - Internal nodes: store separator keys and child handles
//! - Leaf nodes: store key/offset entries, singly linked for range scans

use std::cmp::Ordering;

use crate::btree::key::Key;

/// Handle to a node slot in a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Slot index inside the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An internal (non-leaf) node.
///
/// Stores N keys and N+1 child handles.
/// `children[i]` contains keys < `keys[i]`
/// `children[i+1]` contains keys >= `keys[i]`
#[derive(Debug)]
pub struct InternalNode {
    /// Diagnostic serial number, shown by displays and traces.
    pub serial: u64,
    /// Parent node, `None` for the root.
    pub parent: Option<NodeId>,
    /// Separator keys in sorted order.
    pub keys: Vec<Key>,
    /// Child handles. `children.len()` == `keys.len()` + 1
    pub children: Vec<NodeId>,
}

impl InternalNode {
    /// Create an empty internal node able to hold `max_keys + 1` keys.
    #[must_use]
    pub fn new(serial: u64, parent: Option<NodeId>, max_keys: usize) -> Self {
        Self {
            serial,
            parent,
            keys: Vec::with_capacity(max_keys + 1),
            children: Vec::with_capacity(max_keys + 2),
        }
    }

    /// Index of the child to descend into for `key`: the number of
    /// separators less than or equal to it.
    #[must_use]
    pub fn find_child_index(&self, key: &Key, separator: char) -> usize {
        self.keys
            .partition_point(|k| k.compare(key, separator) != Ordering::Greater)
    }

    /// Index of the leftmost child that may hold keys not less than `key`.
    #[must_use]
    pub fn lower_bound_child_index(&self, key: &Key, separator: char) -> usize {
        self.keys
            .partition_point(|k| k.compare(key, separator) == Ordering::Less)
    }

    /// Position of `child` among this node's children.
    #[must_use]
    pub fn child_position(&self, child: NodeId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }
}

/// A key/offset entry in a leaf node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEntry {
    pub key: Key,
    /// Byte offset of the record in the backing source.
    pub offset: u64,
}

/// A leaf node.
///
/// Stores entries in key order and links to the next leaf.
#[derive(Debug)]
pub struct LeafNode {
    /// Diagnostic serial number, shown by displays and traces.
    pub serial: u64,
    /// Parent node, `None` for the root.
    pub parent: Option<NodeId>,
    /// Next leaf in key order.
    pub next: Option<NodeId>,
    /// Entries in sorted order by key.
    pub entries: Vec<LeafEntry>,
}

impl LeafNode {
    /// Create an empty leaf node able to hold `max_keys + 1` entries.
    #[must_use]
    pub fn new(serial: u64, parent: Option<NodeId>, max_keys: usize) -> Self {
        Self {
            serial,
            parent,
            next: None,
            entries: Vec::with_capacity(max_keys + 1),
        }
    }

    /// Find the index where a key is stored, or where it would be inserted.
    pub fn find_index(&self, key: &Key, separator: char) -> Result<usize, usize> {
        let idx = self
            .entries
            .partition_point(|e| e.key.compare(key, separator) == Ordering::Less);
        match self.entries.get(idx) {
            Some(e) if e.key.compare(key, separator) == Ordering::Equal => Ok(idx),
            _ => Err(idx),
        }
    }

    /// Smallest key in the leaf.
    #[must_use]
    pub fn first_key(&self) -> Option<&Key> {
        self.entries.first().map(|e| &e.key)
    }
}

/// A tree node.
#[derive(Debug)]
pub enum Node {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl Node {
    /// Diagnostic serial number.
    #[must_use]
    pub const fn serial(&self) -> u64 {
        match self {
            Self::Internal(node) => node.serial,
            Self::Leaf(node) => node.serial,
        }
    }

    /// Parent handle.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        match self {
            Self::Internal(node) => node.parent,
            Self::Leaf(node) => node.parent,
        }
    }

    /// Replace the parent handle.
    pub const fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Self::Internal(node) => node.parent = parent,
            Self::Leaf(node) => node.parent = parent,
        }
    }

    /// Number of keys held (separators or entries).
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::len() is not const-stable
    pub fn key_count(&self) -> usize {
        match self {
            Self::Internal(node) => node.keys.len(),
            Self::Leaf(node) => node.entries.len(),
        }
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }
}

/// Slot storage for nodes, addressed by [`NodeId`].
///
/// Freed slots are reused by later allocations.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    live: usize,
    next_serial: u64,
}

impl NodeArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next diagnostic serial number.
    pub const fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    /// Store a node and return its handle.
    pub fn allocate(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index] = Some(node);
            NodeId(index)
        } else {
            self.slots.push(Some(node));
            NodeId(self.slots.len() - 1)
        }
    }

    /// Remove a node, returning it. The handle becomes dangling.
    pub fn free(&mut self, id: NodeId) -> Option<Node> {
        let node = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        self.live -= 1;
        Some(node)
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0)?.as_ref()
    }

    /// Look up a node mutably.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.0)?.as_mut()
    }

    /// Number of live nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Access a node that must be a leaf.
    ///
    /// # Panics
    ///
    /// Panics if the handle is dangling or names an internal node. Both mean
    /// the tree structure is corrupt.
    #[must_use]
    pub fn leaf(&self, id: NodeId) -> &LeafNode {
        match self.get(id) {
            Some(Node::Leaf(leaf)) => leaf,
            other => panic!("node {id} is not a leaf: {other:?}"),
        }
    }

    /// Mutable variant of [`Self::leaf`].
    pub fn leaf_mut(&mut self, id: NodeId) -> &mut LeafNode {
        match self.get_mut(id) {
            Some(Node::Leaf(leaf)) => leaf,
            other => panic!("node {id} is not a leaf: {other:?}"),
        }
    }

    /// Access a node that must be internal.
    ///
    /// # Panics
    ///
    /// Panics if the handle is dangling or names a leaf.
    #[must_use]
    pub fn internal(&self, id: NodeId) -> &InternalNode {
        match self.get(id) {
            Some(Node::Internal(node)) => node,
            other => panic!("node {id} is not internal: {other:?}"),
        }
    }

    /// Mutable variant of [`Self::internal`].
    pub fn internal_mut(&mut self, id: NodeId) -> &mut InternalNode {
        match self.get_mut(id) {
            Some(Node::Internal(node)) => node,
            other => panic!("node {id} is not internal: {other:?}"),
        }
    }

    /// Point `child` at a new parent.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) {
        if let Some(node) = self.get_mut(child) {
            node.set_parent(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Key {
        Key::Text(s.to_string())
    }

    fn leaf_with(keys: &[&str]) -> LeafNode {
        let mut leaf = LeafNode::new(1, None, 4);
        for (i, k) in keys.iter().enumerate() {
            leaf.entries.push(LeafEntry {
                key: text(k),
                offset: i as u64,
            });
        }
        leaf
    }

    #[test]
    fn test_internal_node_find_child() {
        let mut node = InternalNode::new(1, None, 4);
        node.keys = vec![text("b"), text("d"), text("f")];

        // Key less than first key -> first child
        assert_eq!(node.find_child_index(&text("a"), ':'), 0);

        // Key equal to first key -> second child
        assert_eq!(node.find_child_index(&text("b"), ':'), 1);

        // Key between first and second -> second child
        assert_eq!(node.find_child_index(&text("c"), ':'), 1);

        // Key greater than all -> last child
        assert_eq!(node.find_child_index(&text("z"), ':'), 3);
    }

    #[test]
    fn test_lower_bound_child_stays_left_of_equal_separator() {
        let mut node = InternalNode::new(1, None, 4);
        node.keys = vec![text("A:2"), text("B:1")];

        assert_eq!(node.find_child_index(&text("A"), ':'), 1);
        assert_eq!(node.lower_bound_child_index(&text("A"), ':'), 0);
        assert_eq!(node.lower_bound_child_index(&text("B:0"), ':'), 1);
    }

    #[test]
    fn test_leaf_find_index() {
        let leaf = leaf_with(&["b", "d", "f"]);
        assert_eq!(leaf.find_index(&text("d"), ':'), Ok(1));
        assert_eq!(leaf.find_index(&text("a"), ':'), Err(0));
        assert_eq!(leaf.find_index(&text("e"), ':'), Err(2));
        assert_eq!(leaf.find_index(&text("g"), ':'), Err(3));
        assert_eq!(leaf.first_key(), Some(&text("b")));
    }

    #[test]
    fn test_leaf_find_index_prefix_hits_first_match() {
        let leaf = leaf_with(&["A:1", "A:2", "B:1"]);
        assert_eq!(leaf.find_index(&text("A"), ':'), Ok(0));
        assert_eq!(leaf.find_index(&text("B"), ':'), Ok(2));
    }

    #[test]
    fn test_arena_reuses_freed_slots() {
        let mut arena = NodeArena::new();
        let a = arena.allocate(Node::Leaf(LeafNode::new(1, None, 4)));
        let b = arena.allocate(Node::Leaf(LeafNode::new(2, None, 4)));
        assert_eq!(arena.len(), 2);

        let freed = arena.free(a).expect("slot a is live");
        assert_eq!(freed.serial(), 1);
        assert!(arena.get(a).is_none());
        assert!(arena.free(a).is_none());
        assert_eq!(arena.len(), 1);

        let c = arena.allocate(Node::Internal(InternalNode::new(3, None, 4)));
        assert_eq!(c, a);
        assert!(!arena.get(c).expect("slot c is live").is_leaf());
        assert_eq!(arena.leaf(b).serial, 2);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_set_parent() {
        let mut arena = NodeArena::new();
        let leaf = arena.allocate(Node::Leaf(LeafNode::new(1, None, 4)));
        let root = arena.allocate(Node::Internal(InternalNode::new(2, None, 4)));
        arena.set_parent(leaf, Some(root));
        assert_eq!(arena.get(leaf).and_then(Node::parent), Some(root));
    }

    #[test]
    fn test_serials_increase() {
        let mut arena = NodeArena::new();
        let first = arena.next_serial();
        let second = arena.next_serial();
        assert!(second > first);
    }
}
