//! Building an index from a record source.

use std::io::{BufRead, Seek};

use crate::btree::{BPlusTree, BTreeError, KeyError};
use crate::config::TreeConfig;
use crate::query::range::RangeError;
use crate::query::source::{RecordSource, trim_record_start};

/// Which part of a record becomes its key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeySelector {
    /// Text before the first field separator, or the whole record.
    #[default]
    FirstField,
    /// These 1-based fields joined with the key separator.
    Fields(Vec<usize>),
}

impl KeySelector {
    /// Parse a comma separated list of 1-based field numbers, e.g. `"2,1"`.
    pub fn parse(list: &str, config: &TreeConfig) -> Result<Self, BTreeError> {
        let fields = list
            .split(',')
            .map(|f| match f.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(RangeError::InvalidFieldSpec(f.trim().to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        if config.numeric && fields.len() > 1 {
            return Err(KeyError::CompositeKeyUnsupportedInNumericMode(list.to_string()).into());
        }
        Ok(Self::Fields(fields))
    }

    /// Derive the key text of a record. Missing fields contribute nothing.
    #[must_use]
    pub fn key_text(&self, record: &str, config: &TreeConfig) -> String {
        let sep = config.field_separator;
        let record = trim_record_start(record, sep);
        match self {
            Self::FirstField => {
                record.split(sep).next().unwrap_or_default().trim_end().to_string()
            }
            Self::Fields(fields) => {
                let columns: Vec<&str> = record.split(sep).collect();
                fields
                    .iter()
                    .map(|&f| columns.get(f - 1).copied().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(&config.key_separator.to_string())
                    .trim_end()
                    .to_string()
            }
        }
    }
}

/// Index every record of `source` into `tree`. Returns the number indexed.
///
/// Records with an empty key are skipped. The first insertion error stops
/// the load; records indexed before it stay in the tree.
pub fn load_index<R: BufRead + Seek>(
    tree: &mut BPlusTree,
    source: &mut RecordSource<R>,
    selector: &KeySelector,
) -> Result<usize, BTreeError> {
    source.rewind()?;
    let mut loaded = 0;

    while let Some((offset, record)) = source.next_record()? {
        let key = selector.key_text(record, tree.config());
        if key.is_empty() {
            tracing::warn!(offset, "skipping record without a key");
            continue;
        }
        tree.insert(&key, offset).inspect_err(|e| {
            tracing::error!(offset, key = %key, "failed to index record: {e}");
        })?;
        loaded += 1;
    }

    tracing::info!(loaded, nodes = tree.node_count(), "indexed records");
    Ok(loaded)
}
