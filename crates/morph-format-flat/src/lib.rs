#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # morph-format-flat
//!
//! Raw-record readers for positional (fixed-length) and delimited
//! (CSV-style) inputs. Both yield [`RowRecord`]s: an ordered map from
//! column name to text plus the raw line bytes for fingerprinting.

/// CSV-style delimited reader.
pub mod delimited;
/// Fixed-length (rune-offset column) reader.
pub mod fixed;

pub use delimited::DelimitedReader;
pub use fixed::{ColumnSpec, FixedLengthReader};

use thiserror::Error;

/// A minimally parsed flat-format record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// 1-based row number in the input.
    pub line: usize,
    /// The raw record line, trailing newline excluded.
    pub raw: Vec<u8>,
    /// Column name to text, in column order.
    pub fields: Vec<(String, String)>,
}

impl RowRecord {
    /// Text of the named column, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Errors produced by the flat-format readers. All are fatal to the stream.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed row content.
    #[error("invalid input at line {line}: {message}")]
    Read { line: usize, message: String },

    /// Underlying stream failure.
    #[error("invalid input: {0}")]
    Io(String),
}

impl Error {
    /// Build a read error at a specific line.
    pub fn read_at(line: usize, message: impl Into<String>) -> Self {
        Self::Read {
            line,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;
