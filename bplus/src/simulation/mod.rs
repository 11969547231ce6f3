//! Deterministic simulation of index maintenance.
//!
//! A seeded generator drives long mixes of inserts, deletes and lookups
//! against a [`BPlusTree`](crate::BPlusTree) and a `BTreeMap` model of the
//! same contents. After every operation the tree's structural invariants are
//! checked and its contents compared with the model.
//!
//! Given the same seed and settings a run is identical, so a failing seed
//! can be replayed.
//!
//! ```ignore
//! let config = SimulatorConfig::new(12345).with_tree(TreeConfig::default().with_max_keys(3));
//! let result = Simulator::new(config).run(1000);
//! assert!(result.passed(), "{:?}", result.violations);
//! ```

mod ops;
mod simulator;
