//! Delimited byte scanner
//!
//! Splits an input stream on a multi-byte delimiter, honoring an optional
//! release byte: a delimiter occurrence immediately preceded by the release
//! byte does not split, and the release byte stays in the token. Returned
//! slices borrow the scanner's internal buffer and are invalidated by the
//! next call.

use crate::Result;
use std::io::Read;

const DEFAULT_BUF_SIZE: usize = 8 * 1024;

/// Streaming tokenizer over a byte stream.
pub struct DelimScanner<R: Read> {
    input: R,
    delim: Vec<u8>,
    release: Option<u8>,
    /// Whether a trailing token without a closing delimiter is emitted.
    emit_trailing: bool,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
}

impl<R: Read> DelimScanner<R> {
    /// Create a scanner splitting `input` on `delim`.
    pub fn new(input: R, delim: impl Into<Vec<u8>>, release: Option<u8>) -> Self {
        Self::with_capacity(input, delim, release, true, DEFAULT_BUF_SIZE)
    }

    /// Create a scanner with explicit trailing-token behavior and initial
    /// buffer size.
    pub fn with_capacity(
        input: R,
        delim: impl Into<Vec<u8>>,
        release: Option<u8>,
        emit_trailing: bool,
        buf_size: usize,
    ) -> Self {
        let delim = delim.into();
        debug_assert!(!delim.is_empty(), "scanner delimiter must not be empty");
        Self {
            input,
            delim,
            release,
            emit_trailing,
            buf: vec![0; buf_size.max(64)],
            start: 0,
            end: 0,
            eof: false,
        }
    }

    /// Next token, without its trailing delimiter. `None` at end of input.
    ///
    /// The returned slice is valid only until the next call.
    pub fn next_token(&mut self) -> Result<Option<&[u8]>> {
        loop {
            if let Some(at) = self.find_delim() {
                let token_start = self.start;
                self.start = at + self.delim.len();
                return Ok(Some(&self.buf[token_start..at]));
            }
            if self.eof {
                if self.start < self.end && self.emit_trailing {
                    let token_start = self.start;
                    self.start = self.end;
                    return Ok(Some(&self.buf[token_start..self.end]));
                }
                self.start = self.end;
                return Ok(None);
            }
            self.fill()?;
        }
    }

    /// Scan the buffered window for an unescaped delimiter occurrence.
    fn find_delim(&self) -> Option<usize> {
        let window = &self.buf[self.start..self.end];
        let mut i = 0;
        while i < window.len() {
            if Some(window[i]) == self.release {
                // Release escapes the next byte, itself included.
                i += 2;
                continue;
            }
            if window[i..].starts_with(&self.delim) {
                return Some(self.start + i);
            }
            i += 1;
        }
        None
    }

    fn fill(&mut self) -> Result<()> {
        // Shift unconsumed bytes down, then grow if the buffer is full.
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.end == self.buf.len() {
            self.buf.resize(self.buf.len() * 2, 0);
        }
        let n = self.input.read(&mut self.buf[self.end..])?;
        if n == 0 {
            self.eof = true;
        }
        self.end += n;
        Ok(())
    }
}

/// Reader adapter stripping every CR and LF byte from the stream before it
/// reaches the scanner.
pub struct CrLfStrippingReader<R: Read> {
    inner: R,
    chunk: Vec<u8>,
}

impl<R: Read> CrLfStrippingReader<R> {
    /// Wrap `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            chunk: Vec::with_capacity(DEFAULT_BUF_SIZE),
        }
    }
}

impl<R: Read> Read for CrLfStrippingReader<R> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        loop {
            self.chunk.resize(out.len().min(DEFAULT_BUF_SIZE), 0);
            let n = self.inner.read(&mut self.chunk)?;
            if n == 0 {
                return Ok(0);
            }
            let mut written = 0;
            for &b in &self.chunk[..n] {
                if b != b'\r' && b != b'\n' {
                    out[written] = b;
                    written += 1;
                }
            }
            if written > 0 {
                return Ok(written);
            }
            // The whole chunk was CR/LF; read again rather than report EOF.
        }
    }
}
