//! Retrieval of records through the index, or around it.
//!
//! - [`BPlusTree::get`](crate::BPlusTree::get) walks the leaf chain over a
//!   key range and reads each record back at its indexed offset
//! - [`BPlusTree::scan`](crate::BPlusTree::scan) ignores the tree and
//!   matches every raw record against the range
//! - [`load_index`] builds a tree from a record source

mod get;
mod load;
mod range;
mod scan;
mod source;

pub use load::{KeySelector, load_index};
pub use range::{KeyRange, RangeError, RangeSpec, ScanPlan};
pub use source::RecordSource;
