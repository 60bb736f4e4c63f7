#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # morph-format-edi
//!
//! Streaming extraction of raw EDI segments: a delimited byte scanner with
//! release-character handling, and a segment reader that breaks scanner
//! tokens into elements, repetitions and components without any structural
//! validation.

/// Delimited byte scanner over an input stream.
pub mod scanner;
/// Raw-segment reader built on the scanner.
pub mod segment;

pub use scanner::{CrLfStrippingReader, DelimScanner};
pub use segment::{unescape, Delimiters, RawElem, RawSeg, SegmentReader};

use thiserror::Error;

/// Errors produced while extracting raw segments. Both kinds are fatal to
/// the stream: the reader's position cannot be trusted afterwards.
#[derive(Error, Debug)]
pub enum Error {
    /// The underlying stream failed or the input is not scannable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The EDI content is structurally corrupt.
    #[error("invalid EDI near rune {rune_begin}..{rune_end}: {message}")]
    InvalidEdi {
        rune_begin: usize,
        rune_end: usize,
        message: String,
    },
}

impl Error {
    /// Build an invalid-EDI error with the reader's rune span.
    pub fn invalid_edi(rune_begin: usize, rune_end: usize, message: impl Into<String>) -> Self {
        Self::InvalidEdi {
            rune_begin,
            rune_end,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;
