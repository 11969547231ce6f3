//! Structural consistency checking.
//!
//! [`BPlusTree::check`] walks the whole tree and verifies:
//! - leaf keys are strictly ascending
//! - every key lies within the bounds set by the separators above it
//! - every separator equals the smallest key of its right subtree
//! - non-root nodes hold at least `min_keys` keys, no node more than `max_keys`
//! - parent handles match actual parentage
//! - all leaves sit at the same depth
//! - the leaf chain visits exactly the in-order sequence of entries
//! - the arena holds no unreachable nodes

use std::cmp::Ordering;

use crate::btree::key::Key;
use crate::btree::node::{Node, NodeId};
use crate::btree::tree::BPlusTree;

/// A broken structural invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Serial of the offending node, if one is to blame.
    pub node: Option<u64>,
    /// Description of the violation.
    pub description: String,
}

impl InvariantViolation {
    fn at(node: u64, description: impl Into<String>) -> Self {
        Self {
            node: Some(node),
            description: description.into(),
        }
    }

    fn tree(description: impl Into<String>) -> Self {
        Self {
            node: None,
            description: description.into(),
        }
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.node {
            Some(serial) => write!(f, "node {serial}: {}", self.description),
            None => f.write_str(&self.description),
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// State gathered while walking the tree.
struct Walk<'a> {
    tree: &'a BPlusTree,
    leaves_in_order: Vec<NodeId>,
    keys_in_order: Vec<&'a Key>,
    leaf_depth: Option<usize>,
    visited: usize,
}

impl<'a> Walk<'a> {
    fn cmp(&self, a: &Key, b: &Key) -> Ordering {
        a.compare(b, self.tree.config.key_separator)
    }

    /// Check the subtree at `id`, whose keys must lie in `[low, high)`.
    /// Returns the smallest key of the subtree.
    fn visit(
        &mut self,
        id: NodeId,
        parent: Option<NodeId>,
        depth: usize,
        low: Option<&'a Key>,
        high: Option<&'a Key>,
    ) -> Result<Option<&'a Key>, InvariantViolation> {
        let tree = self.tree;
        let Some(node) = tree.arena.get(id) else {
            return Err(InvariantViolation::tree(format!("dangling handle {id}")));
        };
        self.visited += 1;
        let serial = node.serial();

        if node.parent() != parent {
            return Err(InvariantViolation::at(serial, "parent handle mismatch"));
        }

        let count = node.key_count();
        let is_root = parent.is_none();
        if count > tree.config.max_keys {
            return Err(InvariantViolation::at(
                serial,
                format!("{count} keys exceed the fan-out"),
            ));
        }
        if !is_root && count < tree.config.min_keys() {
            return Err(InvariantViolation::at(
                serial,
                format!("{count} keys is below the minimum"),
            ));
        }

        match node {
            Node::Leaf(leaf) => {
                if leaf.entries.is_empty() {
                    return Err(InvariantViolation::at(serial, "empty leaf"));
                }
                match self.leaf_depth {
                    Some(expected) if expected != depth => {
                        return Err(InvariantViolation::at(
                            serial,
                            format!("leaf at depth {depth}, expected {expected}"),
                        ));
                    }
                    _ => self.leaf_depth = Some(depth),
                }

                for pair in leaf.entries.windows(2) {
                    if self.cmp(&pair[0].key, &pair[1].key) != Ordering::Less {
                        return Err(InvariantViolation::at(
                            serial,
                            format!("keys '{}' and '{}' out of order", pair[0].key, pair[1].key),
                        ));
                    }
                }
                for entry in &leaf.entries {
                    self.check_bounds(serial, &entry.key, low, high)?;
                    self.keys_in_order.push(&entry.key);
                }
                self.leaves_in_order.push(id);
                Ok(leaf.first_key())
            }
            Node::Internal(node) => {
                if node.children.len() != node.keys.len() + 1 {
                    return Err(InvariantViolation::at(
                        serial,
                        format!(
                            "{} children for {} keys",
                            node.children.len(),
                            node.keys.len()
                        ),
                    ));
                }
                if is_root && node.keys.is_empty() {
                    return Err(InvariantViolation::at(serial, "root with a single child"));
                }
                for key in &node.keys {
                    self.check_bounds(serial, key, low, high)?;
                }

                let mut smallest = None;
                for (i, &child) in node.children.iter().enumerate() {
                    let child_low = if i == 0 { low } else { Some(&node.keys[i - 1]) };
                    let child_high = node.keys.get(i).or(high);
                    let child_min = self.visit(child, Some(id), depth + 1, child_low, child_high)?;
                    if i == 0 {
                        smallest = child_min;
                        continue;
                    }
                    let separator = &node.keys[i - 1];
                    if child_min.is_none_or(|m| self.cmp(m, separator) != Ordering::Equal) {
                        return Err(InvariantViolation::at(
                            serial,
                            format!("separator '{separator}' is not the smallest key on its right"),
                        ));
                    }
                }
                Ok(smallest)
            }
        }
    }

    fn check_bounds(
        &self,
        serial: u64,
        key: &Key,
        low: Option<&Key>,
        high: Option<&Key>,
    ) -> Result<(), InvariantViolation> {
        if low.is_some_and(|l| self.cmp(key, l) == Ordering::Less) {
            return Err(InvariantViolation::at(
                serial,
                format!("key '{key}' below its lower separator"),
            ));
        }
        if high.is_some_and(|h| self.cmp(key, h) != Ordering::Less) {
            return Err(InvariantViolation::at(
                serial,
                format!("key '{key}' not below its upper separator"),
            ));
        }
        Ok(())
    }
}

impl BPlusTree {
    /// Verify every structural invariant of the tree.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        let Some(root) = self.root else {
            if self.len != 0 || !self.arena.is_empty() {
                return Err(InvariantViolation::tree(format!(
                    "empty tree with {} keys and {} nodes",
                    self.len,
                    self.arena.len()
                )));
            }
            return Ok(());
        };

        let mut walk = Walk {
            tree: self,
            leaves_in_order: Vec::new(),
            keys_in_order: Vec::new(),
            leaf_depth: None,
            visited: 0,
        };
        walk.visit(root, None, 0, None, None)?;

        if walk.visited != self.arena.len() {
            return Err(InvariantViolation::tree(format!(
                "{} nodes reachable but {} allocated",
                walk.visited,
                self.arena.len()
            )));
        }
        if walk.keys_in_order.len() != self.len {
            return Err(InvariantViolation::tree(format!(
                "{} keys stored but length is {}",
                walk.keys_in_order.len(),
                self.len
            )));
        }

        let mut chain = walk.leaves_in_order.iter();
        let mut current = self.first_leaf();
        while let Some(id) = current {
            let leaf = self.arena.leaf(id);
            if chain.next() != Some(&id) {
                return Err(InvariantViolation::at(
                    leaf.serial,
                    "leaf chain diverges from in-order traversal",
                ));
            }
            current = leaf.next;
        }
        if chain.next().is_some() {
            return Err(InvariantViolation::tree("leaf chain ends early"));
        }

        Ok(())
    }
}
