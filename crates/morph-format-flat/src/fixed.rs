//! Fixed-length record reader
//!
//! Reads one line at a time and slices each declared column by rune offsets
//! (not byte offsets), so multi-byte characters in one column never shift
//! its neighbors.

use crate::{Result, RowRecord};
use std::io::{BufRead, BufReader, Read};
use tracing::trace;

/// One positional column: name, 1-based starting rune, width in runes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub start: usize,
    pub length: usize,
}

impl ColumnSpec {
    /// Build a column spec; `start` is 1-based.
    pub fn new(name: impl Into<String>, start: usize, length: usize) -> Self {
        Self {
            name: name.into(),
            start,
            length,
        }
    }
}

/// Streaming reader for fixed-length rows.
pub struct FixedLengthReader {
    input: BufReader<Box<dyn Read>>,
    columns: Vec<ColumnSpec>,
    line: usize,
    line_buf: Vec<u8>,
}

impl FixedLengthReader {
    /// Create a reader slicing rows of `input` by `columns`.
    pub fn new(input: impl Read + 'static, columns: Vec<ColumnSpec>) -> Self {
        Self {
            input: BufReader::new(Box::new(input)),
            columns,
            line: 0,
            line_buf: Vec::new(),
        }
    }

    /// Read the next record. `None` at end of input. Blank lines are
    /// skipped.
    pub fn next_record(&mut self) -> Result<Option<RowRecord>> {
        loop {
            self.line_buf.clear();
            let n = self.input.read_until(b'\n', &mut self.line_buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.line += 1;
            // Strip the row terminator; tolerate CRLF.
            if self.line_buf.last() == Some(&b'\n') {
                self.line_buf.pop();
            }
            if self.line_buf.last() == Some(&b'\r') {
                self.line_buf.pop();
            }
            if self.line_buf.is_empty() {
                continue;
            }
            let text = String::from_utf8_lossy(&self.line_buf);
            let runes: Vec<char> = text.chars().collect();
            let fields = self
                .columns
                .iter()
                .map(|col| {
                    let start = col.start.saturating_sub(1).min(runes.len());
                    let end = (start + col.length).min(runes.len());
                    let value: String = runes[start..end].iter().collect();
                    (col.name.clone(), value.trim().to_string())
                })
                .collect();
            trace!(line = self.line, "read fixed-length row");
            return Ok(Some(RowRecord {
                line: self.line,
                raw: self.line_buf.clone(),
                fields,
            }));
        }
    }

    /// 1-based number of the most recently read line.
    pub fn line(&self) -> usize {
        self.line
    }
}
