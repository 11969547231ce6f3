//! In-memory B+tree mapping keys to record offsets.
//!
//! # Structure
//!
//! The tree consists of:
//! - Internal nodes: store separator keys and child handles
//! - Leaf nodes: store key/offset entries, linked in key order for range scans
//!
//! Nodes live in an arena and refer to each other through [`NodeId`]
//! handles, including the upward parent link used when splits and merges
//! propagate.
//!
//! # Usage
//!
//! ```
//! use bplus::{BPlusTree, TreeConfig};
//!
//! let mut tree = BPlusTree::new(TreeConfig::default().with_numeric(true))?;
//! for (offset, key) in ["30", "10", "20"].iter().enumerate() {
//!     tree.insert(key, offset as u64 * 64)?;
//! }
//! assert_eq!(tree.lookup("20")?, Some(128));
//!
//! tree.delete("10")?;
//! let keys: Vec<String> = tree.iter().map(|e| e.key.to_string()).collect();
//! assert_eq!(keys, ["20", "30"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod check;
mod delete;
mod insert;
mod key;
mod node;
mod tree;

pub use check::InvariantViolation;
pub use key::{Key, KeyError, compare_text};
pub use node::{InternalNode, LeafEntry, LeafNode, Node, NodeArena, NodeId};
pub use tree::{BPlusTree, BTreeError, Cursor, Iter, PathStep, SearchPath};
