//! Tree configuration module.
//!
//! This module provides the tunables a [`BPlusTree`](crate::BPlusTree) is
//! built with, and their validation.
//!
//! # Parameters
//!
//! - `max_keys`: fan-out bound, the most keys a node may hold (default: `4`)
//! - `fill_rate`: fraction of `max_keys` every non-root node must keep (default: `0.5`)
//! - `numeric`: keys are signed integers instead of text (default: `false`)
//! - `field_separator`: separates fields of a raw record (default: tab)
//! - `key_separator`: joins the sub-fields of a composite key (default: `:`)
//!
//! # Invariants
//!
//! After [`TreeConfig::validate`] succeeds:
//! - `max_keys >= 3`
//! - `1 <= min_keys() <= max_keys / 2`
//! - `field_separator != key_separator`

/// Tree configuration.
///
/// # Post-conditions
///
/// A validated configuration guarantees that splitting a full node always
/// produces two halves with at least `min_keys()` keys each.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeConfig {
    /// Maximum number of keys in a node.
    pub max_keys: usize,
    /// Fraction of `max_keys` defining the underflow threshold.
    pub fill_rate: f64,
    /// Whether keys are parsed as signed integers.
    pub numeric: bool,
    /// Field separator for raw records.
    pub field_separator: char,
    /// Separator between the sub-fields of a composite key.
    pub key_separator: char,
}

/// Error returned when a configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A parameter has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_keys: Self::DEFAULT_MAX_KEYS,
            fill_rate: Self::DEFAULT_FILL_RATE,
            numeric: false,
            field_separator: Self::DEFAULT_FIELD_SEPARATOR,
            key_separator: Self::DEFAULT_KEY_SEPARATOR,
        }
    }
}

impl TreeConfig {
    /// Default fan-out.
    pub const DEFAULT_MAX_KEYS: usize = 4;
    /// Default fill rate.
    pub const DEFAULT_FILL_RATE: f64 = 0.5;
    /// Default field separator for raw records.
    pub const DEFAULT_FIELD_SEPARATOR: char = '\t';
    /// Default composite key separator.
    pub const DEFAULT_KEY_SEPARATOR: char = ':';
    /// Smallest fan-out for which splits and merges stay well-formed.
    pub const MIN_MAX_KEYS: usize = 3;

    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fan-out.
    #[must_use]
    pub const fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Set the fill rate.
    #[must_use]
    pub const fn with_fill_rate(mut self, fill_rate: f64) -> Self {
        self.fill_rate = fill_rate;
        self
    }

    /// Switch between numeric and text keys.
    #[must_use]
    pub const fn with_numeric(mut self, numeric: bool) -> Self {
        self.numeric = numeric;
        self
    }

    /// Set the raw record field separator.
    #[must_use]
    pub const fn with_field_separator(mut self, separator: char) -> Self {
        self.field_separator = separator;
        self
    }

    /// Minimum number of keys a non-root node must hold.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn min_keys(&self) -> usize {
        (self.max_keys as f64 * self.fill_rate).floor() as usize
    }

    /// Check that the parameters describe a workable tree.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_keys` is below [`Self::MIN_MAX_KEYS`]
    /// - `fill_rate` is not a finite number in `(0, 1)`
    /// - `min_keys()` is zero or exceeds half of `max_keys`
    /// - the field and key separators coincide
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_keys < Self::MIN_MAX_KEYS {
            return Err(ConfigError::InvalidValue {
                name: "max_keys".to_string(),
                message: format!(
                    "{} is below the minimum of {}",
                    self.max_keys,
                    Self::MIN_MAX_KEYS
                ),
            });
        }

        if !self.fill_rate.is_finite() || self.fill_rate <= 0.0 || self.fill_rate >= 1.0 {
            return Err(ConfigError::InvalidValue {
                name: "fill_rate".to_string(),
                message: format!("{} must be between 0 and 1", self.fill_rate),
            });
        }

        let min_keys = self.min_keys();
        if min_keys == 0 || min_keys > self.max_keys / 2 {
            return Err(ConfigError::InvalidValue {
                name: "fill_rate".to_string(),
                message: format!(
                    "{} gives {min_keys} minimum keys for a fan-out of {}, expected 1..={}",
                    self.fill_rate,
                    self.max_keys,
                    self.max_keys / 2
                ),
            });
        }

        if self.field_separator == self.key_separator {
            return Err(ConfigError::InvalidValue {
                name: "field_separator".to_string(),
                message: format!(
                    "'{}' is reserved for composite keys",
                    self.key_separator.escape_default()
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = TreeConfig::default();
        assert_eq!(config.max_keys, 4);
        assert!((config.fill_rate - 0.5).abs() < f64::EPSILON);
        assert!(!config.numeric);
        assert_eq!(config.field_separator, '\t');
        assert_eq!(config.key_separator, ':');
        assert_eq!(config.min_keys(), 2);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_min_keys_rounds_down() {
        let config = TreeConfig::new().with_max_keys(5);
        assert_eq!(config.min_keys(), 2);

        let config = TreeConfig::new().with_max_keys(9).with_fill_rate(0.3);
        assert_eq!(config.min_keys(), 2);
    }

    #[test]
    fn test_rejects_small_fan_out() {
        let err = TreeConfig::new()
            .with_max_keys(2)
            .validate()
            .expect_err("fan-out of 2 is too small");
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "max_keys".to_string(),
                message: "2 is below the minimum of 3".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_fill_rate_out_of_range() {
        assert!(TreeConfig::new().with_fill_rate(0.0).validate().is_err());
        assert!(TreeConfig::new().with_fill_rate(1.0).validate().is_err());
        assert!(TreeConfig::new().with_fill_rate(f64::NAN).validate().is_err());
        // 4 * 0.2 floors to zero
        assert!(TreeConfig::new().with_fill_rate(0.2).validate().is_err());
        // 4 * 0.8 = 3 > 4 / 2
        assert!(TreeConfig::new().with_fill_rate(0.8).validate().is_err());
    }

    #[test]
    fn test_rejects_colliding_separators() {
        let err = TreeConfig::new()
            .with_field_separator(':')
            .validate()
            .expect_err("separators collide");
        assert_eq!(
            err.to_string(),
            "invalid value for field_separator: ':' is reserved for composite keys"
        );
    }
}
