//! File declaration model
//!
//! The `file_declaration` block of an `omni.2.1` schema: input format
//! settings (EDI delimiters, fixed-length columns, CSV delimiter) plus the
//! record hierarchy with `min`/`max` quotas.

use crate::{Error, Result};
use regex::Regex;
use serde::Deserialize;

/// Input family a schema parses, derived from
/// `parser_settings.file_format_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Edi,
    FixedLength,
    Delimited,
}

impl FileFormat {
    /// Map the schema's format tag onto a format family.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "edi" => Ok(Self::Edi),
            "fixedlength" => Ok(Self::FixedLength),
            "delimited" | "csv" => Ok(Self::Delimited),
            other => Err(Error::invalid(format!("unknown file_format_type '{other}'"))),
        }
    }
}

/// One positional column of a fixed-length input.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ColumnDecl {
    pub name: String,
    /// 1-based starting rune.
    pub start_pos: usize,
    /// Width in runes.
    pub length: usize,
}

fn default_min() -> usize {
    1
}

fn default_max() -> i64 {
    1
}

/// One record in the hierarchy.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordDecl {
    /// Record name; for EDI this is the segment name to match.
    pub name: String,
    /// Minimum occurrences under the parent.
    #[serde(default = "default_min")]
    pub min: usize,
    /// Maximum occurrences; `-1` means unbounded.
    #[serde(default = "default_max")]
    pub max: i64,
    /// Anchored regex over the raw row for flat formats; absent matches
    /// everything.
    #[serde(default, rename = "match")]
    pub matcher: Option<String>,
    /// Child records, in schema-declared order.
    #[serde(default)]
    pub child_records: Vec<RecordDecl>,
    /// Whether a structural mismatch on this record may be skipped instead
    /// of aborting ingestion.
    #[serde(default)]
    pub continue_on_mismatch: bool,
    /// Whether completing an instance of this record produces one output
    /// record. At most one record in the hierarchy may carry this; when
    /// none does, the first top-level record is the target.
    #[serde(default)]
    pub is_target: bool,
}

impl RecordDecl {
    /// Maximum occurrences as a bound; `None` is unbounded.
    pub fn max_bound(&self) -> Option<usize> {
        usize::try_from(self.max).ok()
    }

    fn count_targets(&self) -> usize {
        let own = usize::from(self.is_target);
        own + self
            .child_records
            .iter()
            .map(RecordDecl::count_targets)
            .sum::<usize>()
    }

    fn validate(&self, format: FileFormat) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid("record name must not be empty"));
        }
        if let Some(max) = self.max_bound() {
            if self.min > max {
                return Err(Error::invalid(format!(
                    "record '{}': min {} exceeds max {}",
                    self.name, self.min, max
                )));
            }
        }
        if let Some(pattern) = &self.matcher {
            Regex::new(pattern).map_err(|e| {
                Error::invalid(format!("record '{}': bad match pattern: {e}", self.name))
            })?;
        }
        for child in &self.child_records {
            child.validate(format)?;
        }
        Ok(())
    }
}

/// The `file_declaration` block.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileDecl {
    // EDI settings.
    #[serde(default)]
    pub segment_delimiter: Option<String>,
    #[serde(default)]
    pub element_delimiter: Option<String>,
    #[serde(default)]
    pub component_delimiter: Option<String>,
    #[serde(default)]
    pub repetition_delimiter: Option<String>,
    #[serde(default)]
    pub release_character: Option<String>,
    #[serde(default)]
    pub ignore_crlf: bool,

    // Fixed-length settings.
    #[serde(default)]
    pub columns: Vec<ColumnDecl>,

    // Delimited settings.
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub header_row: bool,

    /// Top-level records in schema-declared order.
    #[serde(default)]
    pub records: Vec<RecordDecl>,
}

impl FileDecl {
    /// Validate the declaration for the given format family.
    pub fn validate(&self, format: FileFormat) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::invalid("file_declaration.records must not be empty"));
        }
        match format {
            FileFormat::Edi => {
                if self.segment_delimiter.as_deref().unwrap_or("").is_empty() {
                    return Err(Error::invalid("EDI schema requires segment_delimiter"));
                }
                if self.element_delimiter.as_deref().unwrap_or("").is_empty() {
                    return Err(Error::invalid("EDI schema requires element_delimiter"));
                }
                if let Some(rc) = &self.release_character {
                    if rc.len() != 1 {
                        return Err(Error::invalid(
                            "release_character must be a single byte",
                        ));
                    }
                }
            }
            FileFormat::FixedLength => {
                if self.columns.is_empty() {
                    return Err(Error::invalid(
                        "fixed-length schema requires at least one column",
                    ));
                }
                for col in &self.columns {
                    if col.start_pos == 0 || col.length == 0 {
                        return Err(Error::invalid(format!(
                            "column '{}': start_pos and length are 1-based and non-zero",
                            col.name
                        )));
                    }
                }
            }
            FileFormat::Delimited => {
                if let Some(d) = &self.delimiter {
                    if d.len() != 1 {
                        return Err(Error::invalid("delimiter must be a single byte"));
                    }
                }
            }
        }
        for record in &self.records {
            record.validate(format)?;
        }
        let mut targets = 0;
        for record in &self.records {
            targets += record.count_targets();
        }
        if targets > 1 {
            return Err(Error::invalid(
                "at most one record may be marked is_target",
            ));
        }
        Ok(())
    }

    /// The release character as a byte, if declared.
    pub fn release_byte(&self) -> Option<u8> {
        self.release_character
            .as_ref()
            .and_then(|s| s.as_bytes().first().copied())
    }
}
