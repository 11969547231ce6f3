//! Unindexed scan over the raw records.

use std::io::{BufRead, Seek};

use crate::btree::{BPlusTree, BTreeError};
use crate::query::range::{RangeSpec, ScanPlan};
use crate::query::source::RecordSource;

impl BPlusTree {
    /// Read every record of `source` and hand those whose key falls in
    /// `spec` to `emit`. Returns the number of matching records.
    ///
    /// The tree's nodes are not consulted, only its key settings. Record
    /// keys are rebuilt from the fields the range names (see
    /// [`ScanPlan`]); records that do not yield a valid key never match.
    pub fn scan<R: BufRead + Seek>(
        &self,
        spec: &str,
        source: &mut RecordSource<R>,
        mut emit: impl FnMut(&str),
    ) -> Result<usize, BTreeError> {
        let plan = ScanPlan::new(&RangeSpec::parse(spec)?, &self.config)?;
        let sep = self.separator();

        source.rewind()?;
        let mut count = 0;
        let mut read = 0;
        while let Some((_, record)) = source.next_record()? {
            read += 1;
            let Some(key) = plan.record_key(record, &self.config) else {
                continue;
            };
            if plan.range.contains(&key, sep) {
                emit(record);
                count += 1;
            }
        }

        tracing::debug!(spec, read, count, "unindexed scan");
        Ok(count)
    }
}
