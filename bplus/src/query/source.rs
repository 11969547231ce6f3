//! Line-oriented record source.
//!
//! Records are newline-terminated lines of a seekable byte stream. The tree
//! stores the byte offset at which each record starts; fetching a record
//! seeks there and reads one line.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// Random access to the records of a seekable stream.
#[derive(Debug)]
pub struct RecordSource<R> {
    reader: R,
    bytes: Vec<u8>,
    line: String,
    position: u64,
}

impl RecordSource<BufReader<File>> {
    /// Open a record file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead + Seek> RecordSource<R> {
    /// Wrap a stream positioned at its start.
    #[must_use]
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            bytes: Vec::new(),
            line: String::new(),
            position: 0,
        }
    }

    /// Read the record starting at `offset`.
    ///
    /// Trailing whitespace, including the line terminator, is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if no record starts there.
    pub fn read_at(&mut self, offset: u64) -> io::Result<&str> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        if self.read_line()? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no record at offset {offset}"),
            ));
        }
        Ok(self.line.trim_end())
    }

    /// Go back to the first record.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.reader.rewind()?;
        self.position = 0;
        Ok(())
    }

    /// Read the next record in stream order, with its starting offset.
    pub fn next_record(&mut self) -> io::Result<Option<(u64, &str)>> {
        let offset = self.position;
        if self.read_line()? == 0 {
            return Ok(None);
        }
        Ok(Some((offset, self.line.trim_end())))
    }

    /// Bytes that are not valid UTF-8 are replaced, so one bad line does
    /// not stop a load or a scan.
    fn read_line(&mut self) -> io::Result<usize> {
        self.bytes.clear();
        let read = self.reader.read_until(b'\n', &mut self.bytes)?;
        self.position += read as u64;
        self.line = String::from_utf8_lossy(&self.bytes).into_owned();
        Ok(read)
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Drop leading whitespace from a record, stopping at the field separator
/// so that an empty first field survives.
#[must_use]
pub fn trim_record_start(record: &str, field_separator: char) -> &str {
    record.trim_start_matches(|c: char| c.is_whitespace() && c != field_separator)
}
