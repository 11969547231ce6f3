//! Deletion: underflow resolution by borrowing and merging.
//!
//! After an entry is removed from its leaf, a node left with fewer than
//! `min_keys` keys is repaired, in order of preference, by:
//!
//! 1. borrowing the greatest key of its left sibling
//! 2. borrowing the smallest key of its right sibling
//! 3. merging with a sibling, which removes one separator from the parent
//!    and may cascade upward
//!
//! Only siblings under the same parent are considered. A root left with a
//! single child is replaced by that child.
//!
//! Separators are lower bounds of their right subtree, so a deleted key may
//! still appear as a separator higher up. Once the structure is settled the
//! tree is walked again and such a separator is replaced by the smallest
//! key of its right subtree.

use std::mem;

use crate::btree::key::Key;
use crate::btree::node::{Node, NodeId};
use crate::btree::tree::{BPlusTree, BTreeError};

/// Siblings of a node under a shared parent.
struct Family {
    parent: NodeId,
    /// Position of the node among the parent's children.
    index: usize,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl BPlusTree {
    /// Remove `key` from the index.
    ///
    /// # Errors
    ///
    /// - [`BTreeError::Key`] if the key text is not valid for this tree
    /// - [`BTreeError::NotFound`] if the key is not indexed
    ///
    /// The tree is left untouched on error.
    pub fn delete(&mut self, key: &str) -> Result<(), BTreeError> {
        let key = self.parse_key(key)?;
        self.delete_key(&key).map(|_| ())
    }

    /// Typed variant of [`Self::delete`]. Returns the removed offset.
    pub fn delete_key(&mut self, key: &Key) -> Result<u64, BTreeError> {
        let sep = self.separator();
        let not_found = || BTreeError::NotFound(key.to_string());

        let leaf_id = self.find_leaf(key).ok_or_else(not_found)?;
        let leaf = self.arena.leaf_mut(leaf_id);
        let position = leaf.find_index(key, sep).map_err(|_| not_found())?;
        let removed = leaf.entries.remove(position);
        self.len -= 1;
        tracing::trace!(leaf = leaf.serial, position, "removed entry");

        self.rebalance_leaf(leaf_id);
        self.refresh_separator(&removed.key);
        Ok(removed.offset)
    }

    fn family(&self, id: NodeId) -> Option<Family> {
        let parent = self.arena.get(id)?.parent()?;
        let node = self.arena.internal(parent);
        let index = node.child_position(id)?;
        Some(Family {
            parent,
            index,
            left: index.checked_sub(1).map(|i| node.children[i]),
            right: node.children.get(index + 1).copied(),
        })
    }

    fn key_count(&self, id: NodeId) -> usize {
        self.arena.get(id).map_or(0, Node::key_count)
    }

    /// Repair leaf `id` after an entry was removed from it.
    fn rebalance_leaf(&mut self, id: NodeId) {
        let min_keys = self.config.min_keys();
        let count = self.key_count(id);

        if self.root == Some(id) {
            if count == 0 {
                self.arena.free(id);
                self.root = None;
                tracing::debug!("tree emptied");
            }
            return;
        }
        if count >= min_keys {
            return;
        }

        let Some(family) = self.family(id) else {
            unreachable!("non-root leaf {id} has no parent")
        };
        tracing::debug!(node = %id, count, "leaf underflow");

        if let Some(left) = family.left.filter(|&l| self.key_count(l) > min_keys) {
            let Some(entry) = self.arena.leaf_mut(left).entries.pop() else {
                unreachable!("left sibling {left} is empty")
            };
            let separator = entry.key.clone();
            self.arena.leaf_mut(id).entries.insert(0, entry);
            self.arena.internal_mut(family.parent).keys[family.index - 1] = separator;
            tracing::debug!(node = %id, from = %left, "leaf borrowed from left");
            return;
        }

        if let Some(right) = family.right.filter(|&r| self.key_count(r) > min_keys) {
            let sibling = self.arena.leaf_mut(right);
            let entry = sibling.entries.remove(0);
            let separator = sibling.entries[0].key.clone();
            self.arena.leaf_mut(id).entries.push(entry);
            self.arena.internal_mut(family.parent).keys[family.index] = separator;
            tracing::debug!(node = %id, from = %right, "leaf borrowed from right");
            return;
        }

        let at = if family.left.is_some() {
            family.index - 1
        } else {
            family.index
        };
        self.merge_leaves(family.parent, at);
    }

    /// Fold leaf `children[at + 1]` of `parent` into `children[at]`.
    fn merge_leaves(&mut self, parent: NodeId, at: usize) {
        let (_, survivor, absorbed) = self.remove_separator(parent, at);
        let Some(Node::Leaf(absorbed_node)) = self.arena.free(absorbed) else {
            unreachable!("merged sibling {absorbed} is not a leaf")
        };

        let leaf = self.arena.leaf_mut(survivor);
        leaf.entries.extend(absorbed_node.entries);
        leaf.next = absorbed_node.next;
        tracing::debug!(
            survivor = %survivor,
            absorbed = %absorbed,
            len = leaf.entries.len(),
            "merged leaves"
        );

        self.rebalance_internal(parent);
    }

    /// Drop separator `at` and child `at + 1` from `parent`, returning the
    /// separator and the two children it used to separate.
    fn remove_separator(&mut self, parent: NodeId, at: usize) -> (Key, NodeId, NodeId) {
        let node = self.arena.internal_mut(parent);
        let separator = node.keys.remove(at);
        let absorbed = node.children.remove(at + 1);
        (separator, node.children[at], absorbed)
    }

    /// Repair internal node `id` after a separator was removed from it.
    fn rebalance_internal(&mut self, id: NodeId) {
        let min_keys = self.config.min_keys();
        let count = self.key_count(id);

        if self.root == Some(id) {
            if count == 0 {
                let Some(Node::Internal(old_root)) = self.arena.free(id) else {
                    unreachable!("root {id} is not internal")
                };
                let child = old_root.children[0];
                self.arena.set_parent(child, None);
                self.root = Some(child);
                tracing::debug!(new_root = %child, "collapsed root");
            }
            return;
        }
        if count >= min_keys {
            return;
        }

        let Some(family) = self.family(id) else {
            unreachable!("non-root node {id} has no parent")
        };
        tracing::debug!(node = %id, count, "internal underflow");

        if let Some(left) = family.left.filter(|&l| self.key_count(l) > min_keys) {
            let sibling = self.arena.internal_mut(left);
            let (Some(key), Some(child)) = (sibling.keys.pop(), sibling.children.pop()) else {
                unreachable!("left sibling {left} is empty")
            };
            let parent = self.arena.internal_mut(family.parent);
            let separator = mem::replace(&mut parent.keys[family.index - 1], key);
            let node = self.arena.internal_mut(id);
            node.keys.insert(0, separator);
            node.children.insert(0, child);
            self.arena.set_parent(child, Some(id));
            tracing::debug!(node = %id, from = %left, "internal node borrowed from left");
            return;
        }

        if let Some(right) = family.right.filter(|&r| self.key_count(r) > min_keys) {
            let sibling = self.arena.internal_mut(right);
            let key = sibling.keys.remove(0);
            let child = sibling.children.remove(0);
            let parent = self.arena.internal_mut(family.parent);
            let separator = mem::replace(&mut parent.keys[family.index], key);
            let node = self.arena.internal_mut(id);
            node.keys.push(separator);
            node.children.push(child);
            self.arena.set_parent(child, Some(id));
            tracing::debug!(node = %id, from = %right, "internal node borrowed from right");
            return;
        }

        let at = if family.left.is_some() {
            family.index - 1
        } else {
            family.index
        };
        self.merge_internals(family.parent, at);
    }

    /// Fold internal node `children[at + 1]` of `parent` into `children[at]`,
    /// pulling their separator down between them.
    fn merge_internals(&mut self, parent: NodeId, at: usize) {
        let (separator, survivor, absorbed) = self.remove_separator(parent, at);
        let Some(Node::Internal(absorbed_node)) = self.arena.free(absorbed) else {
            unreachable!("merged sibling {absorbed} is not internal")
        };

        for &child in &absorbed_node.children {
            self.arena.set_parent(child, Some(survivor));
        }
        let node = self.arena.internal_mut(survivor);
        node.keys.push(separator);
        node.keys.extend(absorbed_node.keys);
        node.children.extend(absorbed_node.children);
        tracing::debug!(
            survivor = %survivor,
            absorbed = %absorbed,
            len = node.keys.len(),
            "merged internal nodes"
        );

        self.rebalance_internal(parent);
    }

    /// Replace a separator equal to the deleted `key` with the smallest key
    /// of the subtree to its right.
    fn refresh_separator(&mut self, key: &Key) {
        let sep = self.separator();
        let mut current = self.root;

        while let Some(id) = current {
            let Some(Node::Internal(node)) = self.arena.get(id) else {
                return;
            };
            let idx = node.find_child_index(key, sep);
            let child = node.children[idx];
            if idx > 0 && node.keys[idx - 1].compare(key, sep).is_eq() {
                let Some(smallest) = self.smallest_key(child) else {
                    return;
                };
                tracing::debug!(node = %id, old = %key, new = %smallest, "refreshed separator");
                self.arena.internal_mut(id).keys[idx - 1] = smallest;
                return;
            }
            current = Some(child);
        }
    }

    /// Smallest key in the subtree rooted at `id`.
    fn smallest_key(&self, mut id: NodeId) -> Option<Key> {
        loop {
            match self.arena.get(id)? {
                Node::Internal(node) => id = *node.children.first()?,
                Node::Leaf(leaf) => return leaf.first_key().cloned(),
            }
        }
    }
}
