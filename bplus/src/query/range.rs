//! Range specifications.
//!
//! A range is written as one of:
//!
//! - `key`: keys comparing equal to `key` (a partial composite key matches
//!   every key it prefixes)
//! - `key,`: keys not less than `key`
//! - `,key`: keys not greater than `key`
//! - `low,high`: keys between the two bounds, inclusive
//!
//! For unindexed scans each sub-field of a bound may name the record field
//! it is compared against with an `@N` suffix (1-based), e.g. `a@2:b`.

use std::cmp::Ordering;

use crate::btree::{Key, KeyError};
use crate::config::TreeConfig;
use crate::query::source::trim_record_start;

/// Parsed bounds of a range, as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    pub low: Option<String>,
    pub high: Option<String>,
    /// Written as a single key rather than a pair of bounds.
    pub exact: bool,
}

/// Bounds of a range, as keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub low: Option<Key>,
    pub high: Option<Key>,
}

impl KeyRange {
    /// Whether `key` falls within the bounds.
    #[must_use]
    pub fn contains(&self, key: &Key, separator: char) -> bool {
        self.low
            .as_ref()
            .is_none_or(|low| key.compare(low, separator) != Ordering::Less)
            && self
                .high
                .as_ref()
                .is_none_or(|high| key.compare(high, separator) != Ordering::Greater)
    }
}

impl RangeSpec {
    /// Split a range specification into its bounds.
    ///
    /// Whitespace around either bound is ignored. Text after the first comma
    /// belongs to the high bound.
    pub fn parse(spec: &str) -> Result<Self, RangeError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(RangeError::InvalidRange("no key specified".to_string()));
        }

        let Some((low, high)) = spec.split_once(',') else {
            return Ok(Self {
                low: Some(spec.to_string()),
                high: Some(spec.to_string()),
                exact: true,
            });
        };

        let bound = |text: &str| {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        };
        let (low, high) = (bound(low), bound(high));
        if low.is_none() && high.is_none() {
            return Err(RangeError::InvalidRange(format!(
                "'{spec}' has no key on either side"
            )));
        }
        Ok(Self {
            low,
            high,
            exact: false,
        })
    }

    /// Turn the bounds into keys for an indexed lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound is not a valid key, or if the low bound
    /// compares greater than the high bound.
    pub fn to_keys(&self, config: &TreeConfig) -> Result<KeyRange, RangeError> {
        let parse = |text: &Option<String>| {
            text.as_deref()
                .map(|t| Key::parse(t, config))
                .transpose()
        };
        let range = KeyRange {
            low: parse(&self.low)?,
            high: parse(&self.high)?,
        };
        check_order(&range, config)?;
        Ok(range)
    }
}

fn check_order(range: &KeyRange, config: &TreeConfig) -> Result<(), RangeError> {
    match (&range.low, &range.high) {
        (Some(low), Some(high)) if low.compare(high, config.key_separator) == Ordering::Greater => {
            Err(RangeError::InvalidRange(format!(
                "low bound '{low}' is above high bound '{high}'"
            )))
        }
        _ => Ok(()),
    }
}

/// Bounds and record field layout for an unindexed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    pub range: KeyRange,
    /// 0-based record field for each key sub-field, in key order.
    pub fields: Vec<usize>,
}

/// One `value[@N]` sub-field of a bound.
struct Component<'a> {
    value: &'a str,
    field: Option<usize>,
}

fn components(bound: &str, separator: char) -> Result<Vec<Component<'_>>, RangeError> {
    bound
        .split(separator)
        .map(|part| {
            let Some((value, field)) = part.split_once('@') else {
                return Ok(Component {
                    value: part.trim(),
                    field: None,
                });
            };
            match field.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Ok(Component {
                    value: value.trim(),
                    field: Some(n),
                }),
                _ => Err(RangeError::InvalidFieldSpec(part.to_string())),
            }
        })
        .collect()
}

impl ScanPlan {
    /// Work out which record fields each bound sub-field is compared with.
    ///
    /// A sub-field without `@N` uses the field after the previous
    /// sub-field's; the first defaults to field 1.
    ///
    /// # Errors
    ///
    /// - [`RangeError::InvalidFieldSpec`] for an `@N` that is not a field number
    /// - [`RangeError::FieldPositionConflict`] when one sub-field is given a
    ///   position in both bounds, or two sub-fields map to the same field
    /// - [`RangeError::Key`] for keys the tree could not hold
    /// - [`RangeError::InvalidRange`] for inverted bounds
    pub fn new(spec: &RangeSpec, config: &TreeConfig) -> Result<Self, RangeError> {
        let sep = config.key_separator;
        let low = spec.low.as_deref().map(|b| components(b, sep)).transpose()?;
        let high = spec.high.as_deref().map(|b| components(b, sep)).transpose()?;

        let width = low
            .as_ref()
            .map_or(0, Vec::len)
            .max(high.as_ref().map_or(0, Vec::len));
        if config.numeric && width > 1 {
            let text = spec.low.as_deref().or(spec.high.as_deref()).unwrap_or_default();
            return Err(KeyError::CompositeKeyUnsupportedInNumericMode(text.to_string()).into());
        }

        let mut fields: Vec<usize> = Vec::with_capacity(width);
        let mut previous = 0;
        for i in 0..width {
            let low_field = low.as_ref().and_then(|c| c.get(i)).and_then(|c| c.field);
            let high_field = high.as_ref().and_then(|c| c.get(i)).and_then(|c| c.field);
            let position = match (low_field, high_field) {
                (Some(n), Some(_)) if spec.exact => n,
                (Some(n), Some(_)) => return Err(RangeError::FieldPositionConflict(n)),
                (Some(n), None) | (None, Some(n)) => n,
                (None, None) => previous + 1,
            };
            if fields.contains(&(position - 1)) {
                return Err(RangeError::FieldPositionConflict(position));
            }
            fields.push(position - 1);
            previous = position;
        }

        let key = |parts: Option<Vec<Component<'_>>>| {
            parts
                .map(|parts| {
                    let text = parts
                        .iter()
                        .map(|c| c.value)
                        .collect::<Vec<_>>()
                        .join(&sep.to_string());
                    Key::parse(&text, config)
                })
                .transpose()
        };
        let range = KeyRange {
            low: key(low)?,
            high: key(high)?,
        };
        check_order(&range, config)?;

        Ok(Self { range, fields })
    }

    /// Build the comparison key of a raw record, or `None` if it does not
    /// yield one.
    #[must_use]
    pub fn record_key(&self, record: &str, config: &TreeConfig) -> Option<Key> {
        let columns: Vec<&str> = trim_record_start(record, config.field_separator)
            .split(config.field_separator)
            .collect();
        let parts: Vec<&str> = self
            .fields
            .iter()
            .map_while(|&f| columns.get(f).copied())
            .collect();
        if parts.is_empty() {
            return None;
        }
        let text = parts.join(&config.key_separator.to_string());
        Key::parse(&text, config).ok()
    }
}

/// Errors in range and field specifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// A record field is designated twice.
    FieldPositionConflict(usize),
    /// An `@N` suffix that is not a field number.
    InvalidFieldSpec(String),
    /// Malformed or inverted range.
    InvalidRange(String),
    /// A bound is not a valid key.
    Key(KeyError),
}

impl std::fmt::Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldPositionConflict(n) => {
                write!(f, "field position {n} must be given for one key only")
            }
            Self::InvalidFieldSpec(text) => write!(f, "invalid field position: '{text}'"),
            Self::InvalidRange(message) => write!(f, "invalid range: {message}"),
            Self::Key(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Key(e) => Some(e),
            _ => None,
        }
    }
}

impl From<KeyError> for RangeError {
    fn from(e: KeyError) -> Self {
        Self::Key(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<Key> {
        Some(Key::Text(s.to_string()))
    }

    #[test]
    fn test_parse_forms() {
        let exact = RangeSpec::parse("abc").expect("exact");
        assert_eq!(exact.low.as_deref(), Some("abc"));
        assert_eq!(exact.high.as_deref(), Some("abc"));
        assert!(exact.exact);

        let from = RangeSpec::parse("100,").expect("open high");
        assert_eq!(from.low.as_deref(), Some("100"));
        assert_eq!(from.high, None);
        assert!(!from.exact);

        let upto = RangeSpec::parse(",100").expect("open low");
        assert_eq!(upto.low, None);
        assert_eq!(upto.high.as_deref(), Some("100"));

        let band = RangeSpec::parse("50,  100").expect("bounded");
        assert_eq!(band.low.as_deref(), Some("50"));
        assert_eq!(band.high.as_deref(), Some("100"));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            RangeSpec::parse("   "),
            Err(RangeError::InvalidRange(_))
        ));
        assert!(matches!(
            RangeSpec::parse(" , "),
            Err(RangeError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_to_keys_rejects_inverted_bounds() {
        let config = TreeConfig::default().with_numeric(true);
        let spec = RangeSpec::parse("100,50").expect("parse");
        let err = spec.to_keys(&config).expect_err("inverted");
        assert!(matches!(err, RangeError::InvalidRange(_)));

        let spec = RangeSpec::parse("x,").expect("parse");
        assert_eq!(
            spec.to_keys(&config),
            Err(RangeError::Key(KeyError::InvalidNumericValue(
                "x".to_string()
            )))
        );
    }

    #[test]
    fn test_key_range_contains_prefixes() {
        let range = KeyRange {
            low: text("A"),
            high: None,
        };
        assert!(range.contains(&Key::Text("A:1".to_string()), ':'));
        assert!(range.contains(&Key::Text("A:2".to_string()), ':'));
        assert!(range.contains(&Key::Text("B".to_string()), ':'));
        assert!(!range.contains(&Key::Text("0".to_string()), ':'));
    }

    #[test]
    fn test_scan_plan_default_fields() {
        let config = TreeConfig::default();
        let spec = RangeSpec::parse("a:b,c").expect("parse");
        let plan = ScanPlan::new(&spec, &config).expect("plan");
        assert_eq!(plan.fields, vec![0, 1]);
        assert_eq!(plan.range.low, text("a:b"));
        assert_eq!(plan.range.high, text("c"));
    }

    #[test]
    fn test_scan_plan_field_override() {
        let config = TreeConfig::default();
        let spec = RangeSpec::parse("a@2").expect("parse");
        let plan = ScanPlan::new(&spec, &config).expect("plan");
        assert_eq!(plan.fields, vec![1]);
        assert_eq!(plan.range.low, text("a"));
        assert_eq!(plan.record_key("b\ta\tc", &config), text("a"));

        // later sub-fields continue after an override
        let spec = RangeSpec::parse("x@3:y,").expect("parse");
        let plan = ScanPlan::new(&spec, &config).expect("plan");
        assert_eq!(plan.fields, vec![2, 3]);
    }

    #[test]
    fn test_scan_plan_conflicts() {
        let config = TreeConfig::default();

        // position given in both bounds
        let spec = RangeSpec::parse("a@2,b@2").expect("parse");
        assert_eq!(
            ScanPlan::new(&spec, &config),
            Err(RangeError::FieldPositionConflict(2))
        );

        // two sub-fields landing on the same field
        let spec = RangeSpec::parse("a@2:b@2,").expect("parse");
        assert_eq!(
            ScanPlan::new(&spec, &config),
            Err(RangeError::FieldPositionConflict(2))
        );
        let spec = RangeSpec::parse("a@2:b@1:c").expect("parse");
        assert_eq!(
            ScanPlan::new(&spec, &config),
            Err(RangeError::FieldPositionConflict(2))
        );
    }

    #[test]
    fn test_scan_plan_bad_field_spec() {
        let config = TreeConfig::default();
        for bad in ["a@0", "a@x", "a@", "a@b@2"] {
            let spec = RangeSpec::parse(bad).expect("parse");
            assert_eq!(
                ScanPlan::new(&spec, &config),
                Err(RangeError::InvalidFieldSpec(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_scan_plan_numeric_composite() {
        let config = TreeConfig::default().with_numeric(true);
        let spec = RangeSpec::parse("1:2,").expect("parse");
        assert!(matches!(
            ScanPlan::new(&spec, &config),
            Err(RangeError::Key(
                KeyError::CompositeKeyUnsupportedInNumericMode(_)
            ))
        ));

        let spec = RangeSpec::parse("5@3").expect("parse");
        let plan = ScanPlan::new(&spec, &config).expect("numeric override");
        assert_eq!(plan.record_key("a\tb\t 5", &config), Some(Key::Int(5)));
        assert_eq!(plan.record_key("a\tb", &config), None);
        assert_eq!(plan.record_key("a\tb\tfive", &config), None);
    }

    #[test]
    fn test_record_key_stops_at_missing_field() {
        let config = TreeConfig::default();
        let spec = RangeSpec::parse("a:b:c").expect("parse");
        let plan = ScanPlan::new(&spec, &config).expect("plan");
        assert_eq!(plan.record_key("x\ty", &config), text("x:y"));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            RangeError::FieldPositionConflict(2).to_string(),
            "field position 2 must be given for one key only"
        );
        assert_eq!(
            RangeError::InvalidFieldSpec("a@0".to_string()).to_string(),
            "invalid field position: 'a@0'"
        );
    }
}
