//! In-memory B+tree mapping keys to record offsets.
//!
//! The tree owns a [`NodeArena`] and a root handle. Every lookup descends
//! from the root with [`Key::compare`]; ordered traversal follows the leaf
//! chain. Structural changes live in the `insert` and `delete` modules.

use std::cmp::Ordering;

use crate::btree::key::{Key, KeyError};
use crate::btree::node::{InternalNode, LeafEntry, LeafNode, Node, NodeArena, NodeId};
use crate::config::{ConfigError, TreeConfig};
use crate::query::RangeError;

/// A B+tree secondary index.
#[derive(Debug)]
pub struct BPlusTree {
    pub(crate) config: TreeConfig,
    pub(crate) arena: NodeArena,
    pub(crate) root: Option<NodeId>,
    pub(crate) len: usize,
}

/// Position of one leaf entry.
///
/// Only meaningful until the next insert or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub leaf: NodeId,
    pub position: usize,
}

/// One node visited by a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub node: NodeId,
    pub serial: u64,
    pub is_leaf: bool,
    /// Keys that compared below the searched key at this node.
    pub passed: Vec<Key>,
}

/// Result of [`BPlusTree::search_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    pub steps: Vec<PathStep>,
    /// Offset of the matching entry, if any.
    pub found: Option<u64>,
}

impl BPlusTree {
    /// Create an empty tree.
    pub fn new(config: TreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            arena: NodeArena::new(),
            root: None,
            len: 0,
        })
    }

    /// The configuration the tree was built with.
    #[must_use]
    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Root handle, `None` for an empty tree.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Look up a node by handle.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    /// Number of indexed keys.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of live nodes.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of levels, zero for an empty tree.
    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut current = self.root;
        while let Some(id) = current {
            height += 1;
            current = match self.arena.get(id) {
                Some(Node::Internal(node)) => node.children.first().copied(),
                _ => None,
            };
        }
        height
    }

    /// Parse text into a key under this tree's configuration.
    pub fn parse_key(&self, text: &str) -> Result<Key, KeyError> {
        Key::parse(text, &self.config)
    }

    pub(crate) const fn separator(&self) -> char {
        self.config.key_separator
    }

    /// Descend to the leaf that owns `key`.
    pub(crate) fn find_leaf(&self, key: &Key) -> Option<NodeId> {
        let sep = self.separator();
        let mut id = self.root?;
        loop {
            match self.arena.get(id)? {
                Node::Internal(node) => {
                    let idx = node.find_child_index(key, sep);
                    tracing::trace!(node = node.serial, child = idx, "descend");
                    id = node.children[idx];
                }
                Node::Leaf(_) => return Some(id),
            }
        }
    }

    /// Leftmost leaf in the tree.
    pub(crate) fn first_leaf(&self) -> Option<NodeId> {
        let mut id = self.root?;
        loop {
            match self.arena.get(id)? {
                Node::Internal(node) => id = *node.children.first()?,
                Node::Leaf(_) => return Some(id),
            }
        }
    }

    /// Point lookup.
    ///
    /// `None` asks for the smallest key in the tree.
    #[must_use]
    pub fn find(&self, key: Option<&Key>) -> Option<Cursor> {
        let Some(key) = key else {
            let leaf = self.first_leaf()?;
            return (!self.arena.leaf(leaf).entries.is_empty())
                .then_some(Cursor { leaf, position: 0 });
        };

        let leaf = self.find_leaf(key)?;
        self.arena
            .leaf(leaf)
            .find_index(key, self.separator())
            .ok()
            .map(|position| Cursor { leaf, position })
    }

    /// Offset stored for a textual key.
    pub fn lookup(&self, key: &str) -> Result<Option<u64>, BTreeError> {
        let key = self.parse_key(key)?;
        Ok(self.find(Some(&key)).and_then(|c| self.entry(c)).map(|e| e.offset))
    }

    /// Cursor at the first entry not less than `key`.
    #[must_use]
    pub fn seek(&self, key: &Key) -> Option<Cursor> {
        let sep = self.separator();
        let mut id = self.root?;
        loop {
            match self.arena.get(id)? {
                Node::Internal(node) => {
                    id = node.children[node.lower_bound_child_index(key, sep)];
                }
                Node::Leaf(leaf) => {
                    let position = leaf
                        .entries
                        .partition_point(|e| e.key.compare(key, sep) == Ordering::Less);
                    if position < leaf.entries.len() {
                        return Some(Cursor { leaf: id, position });
                    }
                    return self.leaf_start(leaf.next);
                }
            }
        }
    }

    /// Step to the next entry in key order.
    #[must_use]
    pub fn advance(&self, cursor: Cursor) -> Option<Cursor> {
        let leaf = self.arena.leaf(cursor.leaf);
        if cursor.position + 1 < leaf.entries.len() {
            return Some(Cursor {
                leaf: cursor.leaf,
                position: cursor.position + 1,
            });
        }
        self.leaf_start(leaf.next)
    }

    /// First entry of the first non-empty leaf from `leaf` onward.
    fn leaf_start(&self, mut leaf: Option<NodeId>) -> Option<Cursor> {
        while let Some(id) = leaf {
            let node = self.arena.leaf(id);
            if !node.entries.is_empty() {
                return Some(Cursor {
                    leaf: id,
                    position: 0,
                });
            }
            leaf = node.next;
        }
        None
    }

    /// Entry under a cursor.
    #[must_use]
    pub fn entry(&self, cursor: Cursor) -> Option<&LeafEntry> {
        match self.arena.get(cursor.leaf)? {
            Node::Leaf(leaf) => leaf.entries.get(cursor.position),
            Node::Internal(_) => None,
        }
    }

    /// Iterate over every entry in key order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            tree: self,
            cursor: self.find(None),
        }
    }

    /// Record the nodes a lookup for `key` passes through.
    #[must_use]
    pub fn search_path(&self, key: &Key) -> SearchPath {
        let sep = self.separator();
        let mut steps = Vec::new();
        let mut found = None;
        let mut current = self.root;

        while let Some(id) = current {
            current = None;
            match self.arena.get(id) {
                Some(Node::Internal(node)) => {
                    let idx = node.find_child_index(key, sep);
                    steps.push(PathStep {
                        node: id,
                        serial: node.serial,
                        is_leaf: false,
                        passed: node.keys[..idx].to_vec(),
                    });
                    current = Some(node.children[idx]);
                }
                Some(Node::Leaf(leaf)) => {
                    let idx = match leaf.find_index(key, sep) {
                        Ok(i) => {
                            found = Some(leaf.entries[i].offset);
                            i
                        }
                        Err(i) => i,
                    };
                    steps.push(PathStep {
                        node: id,
                        serial: leaf.serial,
                        is_leaf: true,
                        passed: leaf.entries[..idx].iter().map(|e| e.key.clone()).collect(),
                    });
                }
                None => {}
            }
        }

        SearchPath { steps, found }
    }

    pub(crate) fn new_leaf(&mut self, parent: Option<NodeId>) -> LeafNode {
        LeafNode::new(self.arena.next_serial(), parent, self.config.max_keys)
    }

    pub(crate) fn new_internal(&mut self, parent: Option<NodeId>) -> InternalNode {
        InternalNode::new(self.arena.next_serial(), parent, self.config.max_keys)
    }
}

/// Iterator over the leaf chain.
pub struct Iter<'a> {
    tree: &'a BPlusTree,
    cursor: Option<Cursor>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a LeafEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor?;
        self.cursor = self.tree.advance(cursor);
        self.tree.entry(cursor)
    }
}

/// Errors that can occur when operating on the tree.
#[derive(Debug)]
pub enum BTreeError {
    /// The key is already indexed.
    DuplicateKey(String),
    /// The key is not indexed.
    NotFound(String),
    /// The key text was rejected.
    Key(KeyError),
    /// The range or field specification was rejected.
    Range(RangeError),
    /// Reading the record source failed.
    Io(std::io::Error),
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(key) => write!(f, "duplicate key: '{key}'"),
            Self::NotFound(key) => write!(f, "key not found: '{key}'"),
            Self::Key(e) => write!(f, "{e}"),
            Self::Range(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "record source error: {e}"),
        }
    }
}

impl std::error::Error for BTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Key(e) => Some(e),
            Self::Range(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::DuplicateKey(_) | Self::NotFound(_) => None,
        }
    }
}

impl From<KeyError> for BTreeError {
    fn from(e: KeyError) -> Self {
        Self::Key(e)
    }
}

impl From<RangeError> for BTreeError {
    fn from(e: RangeError) -> Self {
        Self::Range(e)
    }
}

impl From<std::io::Error> for BTreeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
