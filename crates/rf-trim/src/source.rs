//! CSV job source
//!
//! Rows have no header and may omit the optional trailing columns. The
//! iterator ends (`None`) only at a genuine end of input; a row that cannot
//! be decoded comes back as `Some(Err(TrimError::Source))` and reading
//! continues with the next row.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::{TrimError, TrimResult};
use crate::job::JobRecord;

/// Streaming reader over a CSV job list
pub struct CsvJobSource<R> {
    reader: csv::Reader<R>,
    record: StringRecord,
    rows: u64,
    /// Set after an I/O failure; the underlying reader cannot recover
    exhausted: bool,
}

impl CsvJobSource<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> TrimResult<Self> {
        Self::open_with_delimiter(path, b',')
    }

    pub fn open_with_delimiter<P: AsRef<Path>>(path: P, delimiter: u8) -> TrimResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::with_delimiter(file, delimiter))
    }
}

impl<R: Read> CsvJobSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self::with_delimiter(reader, b',')
    }

    pub fn with_delimiter(reader: R, delimiter: u8) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader);

        Self {
            reader,
            record: StringRecord::new(),
            rows: 0,
            exhausted: false,
        }
    }

    /// Rows handed out so far, malformed ones included
    pub fn rows_read(&self) -> u64 {
        self.rows
    }

    fn line(&self, err: Option<&csv::Error>) -> u64 {
        err.and_then(|e| e.position())
            .or_else(|| self.record.position())
            .map(|p| p.line())
            .unwrap_or(self.rows)
    }
}

impl<R: Read> Iterator for CsvJobSource<R> {
    type Item = TrimResult<JobRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        match self.reader.read_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                self.rows += 1;
                let line = self.line(None);
                Some(Ok(JobRecord::new(line, self.record.iter())))
            }
            Err(err) => {
                self.rows += 1;
                if err.is_io_error() {
                    self.exhausted = true;
                }
                let line = self.line(Some(&err));
                Some(Err(TrimError::Source(format!("line {}: {}", line, err))))
            }
        }
    }
}
