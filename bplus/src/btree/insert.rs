//! Insertion: descent, overflow split and promotion.
//!
//! # Split points
//!
//! A full node holding `max_keys` keys receives one more and is split in
//! two. For leaves the split point `s` is a 0-based entry index, the left
//! leaf keeping entries `0..=s`. For internal nodes it is a 1-based key
//! position, the left node keeping keys `1..=s`.
//!
//! - odd `max_keys`: `s = (max_keys + 1) / 2`, minus one for leaves
//! - even `max_keys`: `s = max_keys / 2 + 1`, minus one for leaves, and minus
//!   one more when the new key lands at or before `s`
//!
//! On an even internal split where the new key lands exactly at `s`, the new
//! key itself moves up to the parent and is never stored in either half.

use crate::btree::key::Key;
use crate::btree::node::{LeafEntry, Node, NodeId};
use crate::btree::tree::{BPlusTree, BTreeError};

/// Where to cut a full node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SplitPoint {
    at: usize,
    /// The inserted key is the one promoted.
    promote_new: bool,
}

impl SplitPoint {
    /// `position` is 0-based for leaves and 1-based for internal nodes.
    fn compute(max_keys: usize, position: usize, leaf: bool) -> Self {
        let leaf_adjust = usize::from(leaf);
        if max_keys % 2 == 1 {
            return Self {
                at: (max_keys + 1) / 2 - leaf_adjust,
                promote_new: false,
            };
        }

        let mut at = max_keys / 2 + 1 - leaf_adjust;
        let promote_new = !leaf && position == at;
        if position <= at {
            at -= 1;
        }
        Self { at, promote_new }
    }
}

impl BPlusTree {
    /// Index `key` at `offset`.
    ///
    /// # Errors
    ///
    /// - [`BTreeError::Key`] if the key text is not valid for this tree
    /// - [`BTreeError::DuplicateKey`] if the key is already indexed
    ///
    /// The tree is left untouched on error.
    pub fn insert(&mut self, key: &str, offset: u64) -> Result<(), BTreeError> {
        let key = self.parse_key(key)?;
        self.insert_key(key, offset)
    }

    /// Typed variant of [`Self::insert`].
    pub fn insert_key(&mut self, key: Key, offset: u64) -> Result<(), BTreeError> {
        let sep = self.separator();

        let Some(root) = self.root else {
            let mut leaf = self.new_leaf(None);
            leaf.entries.push(LeafEntry { key, offset });
            tracing::debug!(serial = leaf.serial, "created root leaf");
            self.root = Some(self.arena.allocate(Node::Leaf(leaf)));
            self.len = 1;
            return Ok(());
        };

        let mut id = root;
        let position = loop {
            match self.arena.get(id) {
                Some(Node::Internal(node)) => {
                    let idx = node.find_child_index(&key, sep);
                    if idx > 0 && node.keys[idx - 1].compare(&key, sep).is_eq() {
                        return Err(BTreeError::DuplicateKey(key.to_string()));
                    }
                    tracing::trace!(node = node.serial, child = idx, "descend");
                    id = node.children[idx];
                }
                Some(Node::Leaf(leaf)) => match leaf.find_index(&key, sep) {
                    Ok(_) => return Err(BTreeError::DuplicateKey(key.to_string())),
                    Err(position) => break position,
                },
                None => unreachable!("dangling child handle {id}"),
            }
        };

        self.len += 1;
        let max_keys = self.config.max_keys;
        let leaf = self.arena.leaf_mut(id);
        if leaf.entries.len() < max_keys {
            leaf.entries.insert(position, LeafEntry { key, offset });
            return Ok(());
        }

        self.split_leaf(id, position, LeafEntry { key, offset });
        Ok(())
    }

    /// Split the full leaf `id` while inserting `entry` at `position`.
    fn split_leaf(&mut self, id: NodeId, position: usize, entry: LeafEntry) {
        let split = SplitPoint::compute(self.config.max_keys, position, true);
        let mut right = self.new_leaf(None);

        let left = self.arena.leaf_mut(id);
        right.parent = left.parent;
        right.next = left.next;
        right.entries.extend(left.entries.drain(split.at + 1..));
        if position <= split.at {
            left.entries.insert(position, entry);
        } else {
            right.entries.insert(position - split.at - 1, entry);
        }

        let promoted = right.entries[0].key.clone();
        tracing::debug!(
            left = left.serial,
            right = right.serial,
            left_len = left.entries.len(),
            right_len = right.entries.len(),
            "split leaf"
        );

        let right_id = self.arena.allocate(Node::Leaf(right));
        self.arena.leaf_mut(id).next = Some(right_id);
        self.insert_into_parent(id, promoted, right_id);
    }

    /// Hook a freshly split `right` sibling of `left` into the parent,
    /// separated by `key`.
    fn insert_into_parent(&mut self, left: NodeId, key: Key, right: NodeId) {
        let Some(parent_id) = self.arena.get(left).and_then(Node::parent) else {
            let mut root = self.new_internal(None);
            root.keys.push(key);
            root.children.extend([left, right]);
            tracing::debug!(serial = root.serial, "grew new root");
            let root_id = self.arena.allocate(Node::Internal(root));
            self.arena.set_parent(left, Some(root_id));
            self.arena.set_parent(right, Some(root_id));
            self.root = Some(root_id);
            return;
        };

        let max_keys = self.config.max_keys;
        let parent = self.arena.internal_mut(parent_id);
        let Some(idx) = parent.child_position(left) else {
            unreachable!("node {left} missing from its parent {parent_id}")
        };

        if parent.keys.len() < max_keys {
            parent.keys.insert(idx, key);
            parent.children.insert(idx + 1, right);
            self.arena.set_parent(right, Some(parent_id));
            return;
        }

        self.split_internal(parent_id, idx, key, right);
    }

    /// Split the full internal node `id` while inserting `key` at index
    /// `idx` with `child` to its right.
    fn split_internal(&mut self, id: NodeId, idx: usize, key: Key, child: NodeId) {
        let position = idx + 1;
        let split = SplitPoint::compute(self.config.max_keys, position, false);
        let mut right = self.new_internal(None);

        let left = self.arena.internal_mut(id);
        right.parent = left.parent;
        right.keys.extend(left.keys.drain(split.at..));
        right.children.extend(left.children.drain(split.at + 1..));

        let promoted = if split.promote_new {
            right.children.insert(0, child);
            key
        } else {
            let (Some(promoted), Some(moved)) = (left.keys.pop(), left.children.pop()) else {
                unreachable!("split of internal node {id} with no keys")
            };
            right.children.insert(0, moved);
            if position <= split.at {
                left.keys.insert(idx, key);
                left.children.insert(idx + 1, child);
            } else {
                let idx = idx - split.at;
                right.keys.insert(idx, key);
                right.children.insert(idx + 1, child);
            }
            promoted
        };

        tracing::debug!(
            left = left.serial,
            right = right.serial,
            left_len = left.keys.len(),
            right_len = right.keys.len(),
            "split internal node"
        );

        let left_has_child = left.children.contains(&child);
        let moved: Vec<NodeId> = right.children.clone();
        let right_id = self.arena.allocate(Node::Internal(right));
        for c in moved {
            self.arena.set_parent(c, Some(right_id));
        }
        if left_has_child {
            self.arena.set_parent(child, Some(id));
        }

        self.insert_into_parent(id, promoted, right_id);
    }
}
