#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # morph-engine
//!
//! The schema-driven ingestion and transformation engine. Given a schema
//! document and an input byte stream, a [`Transform`] produces one
//! transformed output record per `read`, without materializing the input:
//!
//! ```no_run
//! use morph_engine::{Ctx, RawRecord, Schema};
//!
//! # fn main() -> Result<(), morph_engine::EngineError> {
//! let schema_bytes = std::fs::read("orders.schema.json").unwrap();
//! let schema = Schema::new("orders", &schema_bytes)?;
//! let input = std::fs::File::open("orders.edi").unwrap();
//! let mut transform = schema.new_transform("orders.edi", input, Ctx::new())?;
//! while let Some((raw, output)) = transform.read()? {
//!     println!("{} {}", raw.checksum(), String::from_utf8_lossy(&output));
//! }
//! # Ok(())
//! # }
//! ```

/// Error kinds and the continuable-error protocol.
pub mod errors;
/// The ingester state machine.
pub mod ingester;
/// Format adapters producing raw units.
pub mod readers;
/// Raw record wrappers and fingerprinting.
pub mod record;

pub use errors::EngineError;
pub use ingester::{CompiledRecord, Ingester, MatchMode};
pub use readers::{RawChild, RawUnit, UnitReader};
pub use record::{AssembledRecord, RawRecord};

pub use morph_schema::FileFormat;
pub use morph_transform::{Ctx, CustomFuncs, INPUT_NAME_KEY};

use errors::Result;
use ingester::find_target_path;
use morph_format_edi::Delimiters;
use morph_format_flat::ColumnSpec;
use morph_schema::{compile_transform, CreateCtx, FileDecl, HandlerRegistry, TransformDecls};
use readers::{DelimitedUnitReader, EdiUnitReader, FixedUnitReader};
use serde_json::Value;
use std::io::Read;
use tracing::info;

/// Handler family implemented by this engine.
pub const OMNI_VERSION: &str = "omni.2.1";

/// The parsed `omni.2.1` schema body, as produced by the handler
/// constructor.
struct OmniHandler {
    format: FileFormat,
    file_decl: FileDecl,
    transform_decls: TransformDecls,
}

fn create_omni(ctx: &CreateCtx<'_>) -> morph_schema::Result<OmniHandler> {
    let settings = &ctx.header.parser_settings;
    if settings.version != OMNI_VERSION {
        return Err(morph_schema::Error::NotSupported);
    }
    let doc: Value = serde_json::from_slice(ctx.content)
        .map_err(|e| morph_schema::Error::invalid(format!("schema is not valid JSON: {e}")))?;

    let format_tag = settings
        .file_format_type
        .as_deref()
        .ok_or_else(|| morph_schema::Error::invalid("parser_settings.file_format_type is required"))?;
    let format = FileFormat::from_tag(format_tag)?;

    let file_decl: FileDecl = doc
        .get("file_declaration")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| morph_schema::Error::invalid(format!("bad file_declaration: {e}")))?
        .ok_or_else(|| morph_schema::Error::invalid("file_declaration is required"))?;
    file_decl.validate(format)?;

    let transform_block = doc
        .get("transform_declarations")
        .ok_or_else(|| morph_schema::Error::invalid("transform_declarations is required"))?;
    let transform_decls = compile_transform(transform_block)?;

    Ok(OmniHandler {
        format,
        file_decl,
        transform_decls,
    })
}

/// A compiled schema. Immutable after construction and safe to share
/// across threads; every [`Transform`] created from it is independent.
#[derive(Debug)]
pub struct Schema {
    name: String,
    format: FileFormat,
    file_decl: FileDecl,
    records: Vec<CompiledRecord>,
    transform_decls: TransformDecls,
    funcs: CustomFuncs,
}

impl Schema {
    /// Parse and compile a schema document with the built-in custom
    /// functions.
    pub fn new(name: impl Into<String>, content: &[u8]) -> Result<Self> {
        Self::with_custom_funcs(name, content, CustomFuncs::with_builtins())
    }

    /// Parse and compile a schema document with a caller-supplied custom
    /// function table.
    pub fn with_custom_funcs(
        name: impl Into<String>,
        content: &[u8],
        funcs: CustomFuncs,
    ) -> Result<Self> {
        let name = name.into();
        // Fatal creation errors carry the schema name.
        let decorate = |e: EngineError| match e {
            EngineError::SchemaInvalid(m) => {
                EngineError::SchemaInvalid(format!("schema '{name}': {m}"))
            }
            other => other,
        };
        let registry = HandlerRegistry::new(vec![create_omni]);
        let handler = registry
            .create(&name, content)
            .map_err(|e| decorate(EngineError::from(e)))?;
        let records = handler
            .file_decl
            .records
            .iter()
            .map(CompiledRecord::compile)
            .collect::<Result<Vec<_>>>()
            .map_err(decorate)?;
        info!(schema = %name, format = ?handler.format, "schema compiled");
        Ok(Self {
            name,
            format: handler.format,
            file_decl: handler.file_decl,
            records,
            transform_decls: handler.transform_decls,
            funcs,
        })
    }

    /// Schema name used in error decoration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input format family this schema parses.
    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Compiled record hierarchy, for inspection.
    pub fn records(&self) -> &[CompiledRecord] {
        &self.records
    }

    /// Declaration path of the target record.
    pub fn target_path(&self) -> Vec<usize> {
        find_target_path(&self.records)
    }

    /// Create a transform over one input stream.
    ///
    /// `input_name` decorates errors and is exposed to declarations as the
    /// reserved `_input_name` context key.
    pub fn new_transform(
        &self,
        input_name: impl Into<String>,
        input: impl Read + 'static,
        ctx: Ctx,
    ) -> Result<Transform> {
        let input_name = input_name.into();
        let mut ctx = ctx;
        ctx.set(INPUT_NAME_KEY, input_name.clone());

        let (reader, match_mode): (Box<dyn UnitReader>, MatchMode) = match self.format {
            FileFormat::Edi => {
                let decl = &self.file_decl;
                let mut delims = Delimiters::new(
                    decl.segment_delimiter.clone().unwrap_or_default(),
                    decl.element_delimiter.clone().unwrap_or_default(),
                );
                if let Some(component) = &decl.component_delimiter {
                    delims = delims.with_component(component.clone());
                }
                if let Some(repetition) = &decl.repetition_delimiter {
                    delims = delims.with_repetition(repetition.clone());
                }
                if let Some(release) = decl.release_byte() {
                    delims = delims.with_release(release);
                }
                delims = delims.with_ignore_crlf(decl.ignore_crlf);
                (Box::new(EdiUnitReader::new(input, delims)), MatchMode::ByName)
            }
            FileFormat::FixedLength => {
                let columns = self
                    .file_decl
                    .columns
                    .iter()
                    .map(|c| ColumnSpec::new(c.name.clone(), c.start_pos, c.length))
                    .collect();
                (
                    Box::new(FixedUnitReader::new(input, columns)),
                    MatchMode::ByPattern,
                )
            }
            FileFormat::Delimited => {
                let delimiter = self
                    .file_decl
                    .delimiter
                    .as_ref()
                    .and_then(|d| d.as_bytes().first().copied())
                    .unwrap_or(b',');
                let columns = self
                    .file_decl
                    .columns
                    .iter()
                    .map(|c| c.name.clone())
                    .collect();
                (
                    Box::new(DelimitedUnitReader::new(
                        input,
                        delimiter,
                        self.file_decl.header_row,
                        columns,
                    )),
                    MatchMode::ByPattern,
                )
            }
        };

        let ingester = Ingester::new(
            reader,
            match_mode,
            self.records.clone(),
            self.transform_decls.clone(),
            self.funcs.clone(),
            ctx,
        );
        Ok(Transform {
            ingester,
            schema_name: self.name.clone(),
            input_name,
            fatal: None,
        })
    }
}

/// A pull-based transform over one input stream. Owned by exactly one
/// caller; not safe for concurrent use.
pub struct Transform {
    ingester: Ingester,
    schema_name: String,
    input_name: String,
    fatal: Option<EngineError>,
}

impl Transform {
    /// Produce the next output record: the raw record wrapper plus the
    /// serialized output bytes. `None` at a clean end of input.
    ///
    /// After a non-continuable error, every later call returns the same
    /// error.
    pub fn read(&mut self) -> Result<Option<(AssembledRecord, Vec<u8>)>> {
        if let Some(err) = &self.fatal {
            return Err(err.clone());
        }
        match self.ingester.read() {
            Ok(result) => Ok(result),
            Err(e) => {
                if !e.is_continuable() {
                    self.fatal = Some(e.clone());
                }
                Err(e)
            }
        }
    }

    /// Whether ingestion may proceed past `err`.
    pub fn is_continuable(&self, err: &EngineError) -> bool {
        err.is_continuable()
    }

    /// Decorate `err` with the schema name, input name and current input
    /// position.
    pub fn format_error(&self, err: &EngineError) -> String {
        format!(
            "schema '{}' input '{}' near {}: {err}",
            self.schema_name,
            self.input_name,
            self.ingester.position()
        )
    }
}
