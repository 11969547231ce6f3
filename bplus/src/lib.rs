// Layout:
// 1. Records live in an append-only text file, one per line
// 2. Loading reads every line, derives its key and indexes (key, offset)
// 3. Lookups:
//     - get: walk the leaf chain over a key range, read each record back
//     - scan: ignore the tree, match every record against the range
// 4. Inserts and deletes only touch the in-memory index
//
// System components:
//  - B+tree over an arena of nodes
//  - Range parsing and record retrieval
//  - Interactive shell

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod btree;
pub mod config;
pub mod query;
pub mod shell;

#[cfg(test)]
mod simulation;

pub use btree::{BPlusTree, BTreeError, Key, KeyError};
pub use config::{ConfigError, TreeConfig};
pub use query::{KeySelector, RangeError, RecordSource, load_index};
pub use shell::{Shell, ShellOptions};
