//! Operation generator for deterministic simulation testing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for operation generation.
#[derive(Debug, Clone)]
pub struct OpGenConfig {
    /// Number of distinct keys drawn from. A small pool means more
    /// duplicates and more deletes that hit.
    pub key_pool: i64,
    /// Probability of a delete.
    pub delete_rate: f64,
    /// Probability of a lookup.
    pub lookup_rate: f64,
}

impl Default for OpGenConfig {
    fn default() -> Self {
        Self {
            key_pool: 200,
            delete_rate: 0.35,
            lookup_rate: 0.15,
        }
    }
}

/// One step of a simulation. Keys are drawn as integers; the simulator
/// renders them as text for the tree's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert { key: i64, offset: u64 },
    Delete { key: i64 },
    Lookup { key: i64 },
}

/// Generates reproducible operation sequences.
pub struct OperationGenerator {
    rng: StdRng,
    config: OpGenConfig,
    next_offset: u64,
}

impl OperationGenerator {
    #[must_use]
    pub fn new(seed: u64, config: OpGenConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
            next_offset: 0,
        }
    }

    /// Generate the next operation.
    pub fn next_operation(&mut self) -> Operation {
        let key = self.rng.random_range(0..self.config.key_pool);
        let roll: f64 = self.rng.random();

        if roll < self.config.delete_rate {
            Operation::Delete { key }
        } else if roll < self.config.delete_rate + self.config.lookup_rate {
            Operation::Lookup { key }
        } else {
            // offsets grow like positions in an append-only file
            self.next_offset += self.rng.random_range(1..120);
            Operation::Insert {
                key,
                offset: self.next_offset,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_deterministic() {
        let mut a = OperationGenerator::new(7, OpGenConfig::default());
        let mut b = OperationGenerator::new(7, OpGenConfig::default());
        for _ in 0..100 {
            assert_eq!(a.next_operation(), b.next_operation());
        }
    }

    #[test]
    fn test_generator_mix() {
        let mut generator = OperationGenerator::new(1, OpGenConfig::default());
        let ops: Vec<Operation> = (0..1000).map(|_| generator.next_operation()).collect();

        let inserts = ops
            .iter()
            .filter(|op| matches!(op, Operation::Insert { .. }))
            .count();
        let deletes = ops
            .iter()
            .filter(|op| matches!(op, Operation::Delete { .. }))
            .count();
        assert!(inserts > 300 && deletes > 200, "{inserts} inserts, {deletes} deletes");
        assert!(ops.iter().all(|op| match *op {
            Operation::Insert { key, .. } | Operation::Delete { key } | Operation::Lookup { key } =>
                (0..200).contains(&key),
        }));
    }

    #[test]
    fn test_insert_offsets_increase() {
        let config = OpGenConfig {
            delete_rate: 0.0,
            lookup_rate: 0.0,
            ..OpGenConfig::default()
        };
        let mut generator = OperationGenerator::new(3, config);
        let offsets: Vec<u64> = (0..50)
            .filter_map(|_| match generator.next_operation() {
                Operation::Insert { offset, .. } => Some(offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets.len(), 50);
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    }
}
