//! Indexed range retrieval.

use std::cmp::Ordering;
use std::io::{BufRead, Seek};

use crate::btree::{BPlusTree, BTreeError};
use crate::query::range::RangeSpec;
use crate::query::source::RecordSource;

impl BPlusTree {
    /// Fetch the records whose keys fall in `spec`, in key order.
    ///
    /// Each record is read from `source` at its indexed offset and handed to
    /// `emit`. Returns the number of records fetched.
    ///
    /// # Errors
    ///
    /// - [`BTreeError::Range`] for a malformed or inverted range
    /// - [`BTreeError::Key`] for a bound the tree could not hold
    /// - [`BTreeError::Io`] if a record cannot be read back
    ///
    /// Validation happens before anything is read from `source`.
    pub fn get<R: BufRead + Seek>(
        &self,
        spec: &str,
        source: &mut RecordSource<R>,
        mut emit: impl FnMut(&str),
    ) -> Result<usize, BTreeError> {
        let range = RangeSpec::parse(spec)?.to_keys(&self.config)?;
        let sep = self.separator();

        let mut cursor = match &range.low {
            Some(low) => self.seek(low),
            None => self.find(None),
        };
        let mut count = 0;

        while let Some(current) = cursor {
            let Some(entry) = self.entry(current) else {
                break;
            };
            if range
                .high
                .as_ref()
                .is_some_and(|high| entry.key.compare(high, sep) == Ordering::Greater)
            {
                break;
            }

            emit(source.read_at(entry.offset)?);
            count += 1;
            cursor = self.advance(current);
        }

        tracing::debug!(spec, count, "indexed range query");
        Ok(count)
    }
}
