//! Schema header
//!
//! The only part of a schema document the registry inspects. Everything
//! else belongs to the handler selected by `parser_settings.version`.

use crate::{Error, Result};
use serde::Deserialize;

/// Parsed schema header.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub parser_settings: ParserSettings,
}

/// The `parser_settings` block of a schema document.
#[derive(Debug, Clone, Deserialize)]
pub struct ParserSettings {
    /// Handler family and version, e.g. `omni.2.1`.
    pub version: String,
    /// Input format the handler should parse, e.g. `edi`, `fixedlength`,
    /// `delimited`.
    #[serde(default)]
    pub file_format_type: Option<String>,
}

impl Header {
    /// Parse a schema document far enough to read its header.
    pub fn parse(content: &[u8]) -> Result<Self> {
        serde_json::from_slice(content)
            .map_err(|e| Error::invalid(format!("cannot parse parser_settings: {e}")))
    }
}
