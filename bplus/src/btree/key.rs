//! Index keys and their ordering.
//!
//! A tree holds either signed integer keys or text keys. Text keys may be
//! composite: several sub-fields joined by the key separator (`:` by
//! default), e.g. `"A:1"`.
//!
//! # Ordering
//!
//! Integers compare numerically. Text keys compare byte-wise, but when the
//! two operands carry a different number of sub-fields only the length of
//! the shorter-composed operand takes part. A partial key therefore compares
//! equal to every fully specified key it is a prefix of:
//!
//! ```
//! use std::cmp::Ordering;
//! use bplus::btree::compare_text;
//!
//! assert_eq!(compare_text("A", "A:1", ':'), Ordering::Equal);
//! assert_eq!(compare_text("A:1", "A:2", ':'), Ordering::Less);
//! assert_eq!(compare_text("AB", "A:1", ':'), Ordering::Greater);
//! ```

use std::cmp::Ordering;

use crate::config::TreeConfig;

/// A key stored in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Numeric mode key.
    Int(i64),
    /// Text mode key, possibly composite.
    Text(String),
}

impl Key {
    /// Parse user supplied text into a key for the given configuration.
    ///
    /// In numeric mode surrounding whitespace is ignored. In text mode
    /// trailing whitespace is dropped and the rest is kept verbatim.
    pub fn parse(text: &str, config: &TreeConfig) -> Result<Self, KeyError> {
        if !config.numeric {
            return Ok(Self::Text(text.trim_end().to_string()));
        }

        if text.contains(config.key_separator) {
            return Err(KeyError::CompositeKeyUnsupportedInNumericMode(
                text.trim().to_string(),
            ));
        }

        text.trim()
            .parse::<i64>()
            .map(Self::Int)
            .map_err(|_| KeyError::InvalidNumericValue(text.trim().to_string()))
    }

    /// Compare two keys.
    ///
    /// An integer key sorts before any text key; a single tree never mixes
    /// the two.
    #[must_use]
    pub fn compare(&self, other: &Self, separator: char) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => compare_text(a, b, separator),
            (Self::Int(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Int(_)) => Ordering::Greater,
        }
    }

    /// Number of sub-fields in the key. Integer keys always have one.
    #[must_use]
    pub fn component_count(&self, separator: char) -> usize {
        match self {
            Self::Int(_) => 1,
            Self::Text(text) => text.matches(separator).count() + 1,
        }
    }

    /// Whether this is the empty text key.
    #[must_use]
    pub const fn is_empty_text(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Compare two text keys, honouring composite prefixes.
///
/// With the same number of separators this is a plain lexicographic byte
/// comparison. Otherwise both operands are truncated to the length of the
/// one with fewer separators before comparing.
#[must_use]
pub fn compare_text(a: &str, b: &str, separator: char) -> Ordering {
    let a_parts = a.matches(separator).count();
    let b_parts = b.matches(separator).count();
    if a_parts == b_parts {
        return a.as_bytes().cmp(b.as_bytes());
    }

    let len = if a_parts < b_parts { a.len() } else { b.len() };
    let a = &a.as_bytes()[..a.len().min(len)];
    let b = &b.as_bytes()[..b.len().min(len)];
    a.cmp(b)
}

/// Errors raised while turning text into a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Numeric mode key that is not a valid signed integer.
    InvalidNumericValue(String),
    /// Numeric mode key made of several sub-fields.
    CompositeKeyUnsupportedInNumericMode(String),
}

impl std::fmt::Display for KeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumericValue(text) => write!(f, "invalid number: '{text}'"),
            Self::CompositeKeyUnsupportedInNumericMode(text) => {
                write!(
                    f,
                    "composite keys unsupported with numerical trees: '{text}'"
                )
            }
        }
    }
}

impl std::error::Error for KeyError {}
