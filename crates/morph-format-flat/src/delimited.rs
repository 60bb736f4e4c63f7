//! Delimited (CSV-style) record reader
//!
//! Thin streaming wrapper over the `csv` crate with a configurable
//! delimiter and opt-in first-row-as-names handling.

use crate::{Error, Result, RowRecord};
use std::io::Read;
use tracing::{debug, trace};

/// Streaming reader for delimited rows.
pub struct DelimitedReader {
    records: csv::StringRecordsIntoIter<Box<dyn Read>>,
    delimiter: u8,
    /// Explicit column names; filled from the first row when
    /// `first_row_names` is set.
    columns: Vec<String>,
    first_row_names: bool,
    header_consumed: bool,
    line: usize,
}

impl DelimitedReader {
    /// Create a reader over `input`.
    ///
    /// When `first_row_names` is set the first row supplies the column
    /// names; otherwise `columns` is used, padded with `col_N` for any
    /// extra values.
    pub fn new(
        input: impl Read + 'static,
        delimiter: u8,
        first_row_names: bool,
        columns: Vec<String>,
    ) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(Box::new(input) as Box<dyn Read>);
        Self {
            records: reader.into_records(),
            delimiter,
            columns,
            first_row_names,
            header_consumed: false,
            line: 0,
        }
    }

    /// Read the next record. `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<RowRecord>> {
        if self.first_row_names && !self.header_consumed {
            self.header_consumed = true;
            match self.next_row()? {
                Some(row) => {
                    self.columns = row;
                    debug!(columns = self.columns.len(), "read header row");
                }
                None => return Ok(None),
            }
        }
        let Some(row) = self.next_row()? else {
            return Ok(None);
        };

        let fields = row
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let name = self
                    .columns
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("col_{i}"));
                (name, value.clone())
            })
            .collect();
        // Canonical raw form: values rejoined with the delimiter.
        let raw = row.join(&(self.delimiter as char).to_string()).into_bytes();
        trace!(line = self.line, "read delimited row");
        Ok(Some(RowRecord {
            line: self.line,
            raw,
            fields,
        }))
    }

    fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        match self.records.next() {
            None => Ok(None),
            Some(Err(e)) => Err(Error::read_at(self.line + 1, e.to_string())),
            Some(Ok(record)) => {
                self.line += 1;
                Ok(Some(record.iter().map(|s| s.to_string()).collect()))
            }
        }
    }

    /// 1-based number of the most recently read row, header included.
    pub fn line(&self) -> usize {
        self.line
    }
}
