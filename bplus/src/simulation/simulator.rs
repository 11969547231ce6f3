//! Simulation harness: runs generated operations against a tree and a model.

use std::collections::BTreeMap;

use crate::btree::{BPlusTree, BTreeError};
use crate::config::TreeConfig;

use super::ops::{OpGenConfig, Operation, OperationGenerator};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    pub tree: TreeConfig,
    pub ops: OpGenConfig,
}

impl SimulatorConfig {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tree: TreeConfig::default(),
            ops: OpGenConfig::default(),
        }
    }

    #[must_use]
    pub fn with_tree(mut self, tree: TreeConfig) -> Self {
        self.tree = tree;
        self
    }

    #[must_use]
    pub const fn with_key_pool(mut self, key_pool: i64) -> Self {
        self.ops.key_pool = key_pool;
        self
    }

    #[must_use]
    pub const fn with_delete_rate(mut self, rate: f64) -> Self {
        self.ops.delete_rate = rate;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    pub seed: u64,
    pub operations: u64,
    /// Operations the tree accepted.
    pub successful: u64,
    /// Operations the tree rejected, e.g. duplicate inserts.
    pub rejected: u64,
    pub final_len: usize,
    pub final_height: usize,
    pub violations: Vec<String>,
}

impl SimulationResult {
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

pub struct Simulator {
    config: SimulatorConfig,
    generator: OperationGenerator,
    /// Expected contents, by numeric key.
    model: BTreeMap<i64, u64>,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let generator = OperationGenerator::new(config.seed, config.ops.clone());
        Self {
            config,
            generator,
            model: BTreeMap::new(),
        }
    }

    /// Key text as the tree sees it. Text keys are zero padded so that their
    /// byte order matches the model's numeric order.
    fn key_text(&self, key: i64) -> String {
        if self.config.tree.numeric {
            (key - self.config.ops.key_pool / 2).to_string()
        } else {
            format!("k{key:06}")
        }
    }

    /// Run `count` operations, stopping at the first violation.
    pub fn run(&mut self, count: usize) -> SimulationResult {
        let mut result = SimulationResult {
            seed: self.config.seed,
            operations: 0,
            successful: 0,
            rejected: 0,
            final_len: 0,
            final_height: 0,
            violations: Vec::new(),
        };

        let mut tree = match BPlusTree::new(self.config.tree.clone()) {
            Ok(tree) => tree,
            Err(e) => {
                result.violations.push(format!("failed to create tree: {e}"));
                return result;
            }
        };

        for index in 0..count {
            let operation = self.generator.next_operation();
            result.operations += 1;

            match self.apply(&mut tree, operation) {
                Ok(true) => result.successful += 1,
                Ok(false) => result.rejected += 1,
                Err(violation) => {
                    result
                        .violations
                        .push(format!("operation {index} ({operation:?}): {violation}"));
                    break;
                }
            }
            if let Err(violation) = self.verify(&tree) {
                result
                    .violations
                    .push(format!("after operation {index} ({operation:?}): {violation}"));
                break;
            }
        }

        result.final_len = tree.len();
        result.final_height = tree.height();
        result
    }

    /// Apply one operation to both tree and model. Returns whether the tree
    /// accepted it, or a description of a disagreement.
    fn apply(&mut self, tree: &mut BPlusTree, operation: Operation) -> Result<bool, String> {
        match operation {
            Operation::Insert { key, offset } => {
                let text = self.key_text(key);
                match (tree.insert(&text, offset), self.model.contains_key(&key)) {
                    (Ok(()), false) => {
                        self.model.insert(key, offset);
                        Ok(true)
                    }
                    (Err(BTreeError::DuplicateKey(_)), true) => Ok(false),
                    (outcome, present) => Err(format!(
                        "insert returned {outcome:?} with key present in model: {present}"
                    )),
                }
            }
            Operation::Delete { key } => {
                let text = self.key_text(key);
                match (tree.delete(&text), self.model.remove(&key)) {
                    (Ok(()), Some(_)) => Ok(true),
                    (Err(BTreeError::NotFound(_)), None) => Ok(false),
                    (outcome, expected) => Err(format!(
                        "delete returned {outcome:?}, model held {expected:?}"
                    )),
                }
            }
            Operation::Lookup { key } => {
                let text = self.key_text(key);
                let found = tree.lookup(&text).map_err(|e| e.to_string())?;
                let expected = self.model.get(&key).copied();
                if found == expected {
                    Ok(found.is_some())
                } else {
                    Err(format!("lookup found {found:?}, expected {expected:?}"))
                }
            }
        }
    }

    /// Check structure, then compare the leaf chain with the model.
    fn verify(&self, tree: &BPlusTree) -> Result<(), String> {
        tree.check().map_err(|v| v.to_string())?;

        if tree.len() != self.model.len() {
            return Err(format!(
                "tree holds {} keys, model holds {}",
                tree.len(),
                self.model.len()
            ));
        }
        for (entry, (&key, &offset)) in tree.iter().zip(&self.model) {
            let expected = self.key_text(key);
            if entry.key.to_string() != expected || entry.offset != offset {
                return Err(format!(
                    "leaf chain has ({}, {}), expected ({expected}, {offset})",
                    entry.key, entry.offset
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAN_OUTS: [(usize, f64); 6] = [(3, 0.5), (4, 0.5), (5, 0.4), (6, 0.5), (7, 0.3), (8, 0.5)];

    fn assert_passes(config: SimulatorConfig, count: usize) -> SimulationResult {
        let result = Simulator::new(config).run(count);
        assert!(
            result.passed(),
            "seed {} failed: {:?}",
            result.seed,
            result.violations
        );
        assert_eq!(result.operations, count as u64);
        result
    }

    #[test]
    fn test_text_keys_across_fan_outs() {
        for (seed, (max_keys, fill_rate)) in (100..).zip(FAN_OUTS) {
            let tree = TreeConfig::default()
                .with_max_keys(max_keys)
                .with_fill_rate(fill_rate);
            assert_passes(SimulatorConfig::new(seed).with_tree(tree), 2_000);
        }
    }

    #[test]
    fn test_numeric_keys_across_fan_outs() {
        for (seed, (max_keys, fill_rate)) in (200..).zip(FAN_OUTS) {
            let tree = TreeConfig::default()
                .with_max_keys(max_keys)
                .with_fill_rate(fill_rate)
                .with_numeric(true);
            assert_passes(SimulatorConfig::new(seed).with_tree(tree), 2_000);
        }
    }

    #[test]
    fn test_grow_then_drain() {
        let tree = TreeConfig::default().with_max_keys(3);
        let config = SimulatorConfig::new(42)
            .with_tree(tree.clone())
            .with_key_pool(500)
            .with_delete_rate(0.0);
        let grown = assert_passes(config, 3_000);
        assert!(grown.final_height >= 4, "height {}", grown.final_height);

        // deletes dominate, so the tree shrinks back toward empty
        let config = SimulatorConfig::new(43)
            .with_tree(tree)
            .with_key_pool(30)
            .with_delete_rate(0.8);
        let drained = assert_passes(config, 3_000);
        assert!(drained.final_len < 30);
    }

    #[test]
    fn test_simulator_deterministic() {
        let run = || Simulator::new(SimulatorConfig::new(12345)).run(500);
        let (a, b) = (run(), run());
        assert_eq!(a.successful, b.successful);
        assert_eq!(a.rejected, b.rejected);
        assert_eq!(a.final_len, b.final_len);
        assert!(a.rejected > 0);
    }

    #[test]
    fn test_invalid_tree_config_is_reported() {
        let config = SimulatorConfig::new(1).with_tree(TreeConfig::default().with_max_keys(2));
        let result = Simulator::new(config).run(10);
        assert!(!result.passed());
        assert_eq!(result.operations, 0);
    }

    #[test]
    #[ignore] // Long running test
    fn test_simulator_stress() {
        for seed in 0..50 {
            for (max_keys, fill_rate) in FAN_OUTS {
                let tree = TreeConfig::default()
                    .with_max_keys(max_keys)
                    .with_fill_rate(fill_rate)
                    .with_numeric(seed % 2 == 0);
                assert_passes(
                    SimulatorConfig::new(seed).with_tree(tree).with_key_pool(1_000),
                    10_000,
                );
            }
        }
    }
}
