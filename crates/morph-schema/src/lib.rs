#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # morph-schema
//!
//! Schema documents for the datamorph engine: the self-describing header
//! (`parser_settings`), a handler registry that picks the first handler
//! accepting a schema, and the `omni.2.1` declaration model — the record
//! hierarchy (`file_declaration`) and the compiled transform declarations
//! (`transform_declarations`).

/// Record hierarchy and format settings (`file_declaration`).
pub mod file_decl;
/// Self-describing schema header (`parser_settings`).
pub mod header;
/// Handler selection over an explicit handler list.
pub mod registry;
/// Transform declaration model and compiler.
pub mod transform_decl;

pub use file_decl::{ColumnDecl, FileDecl, FileFormat, RecordDecl};
pub use header::{Header, ParserSettings};
pub use registry::{CreateCtx, HandlerRegistry};
pub use transform_decl::{compile_transform, Decl, TransformDecls};

use thiserror::Error;

/// Errors raised while parsing or compiling a schema.
#[derive(Error, Debug)]
pub enum Error {
    /// The handler does not recognize this schema family. The registry
    /// recovers from this by trying the next handler.
    #[error("schema not supported")]
    NotSupported,

    /// The schema document is malformed. Fatal.
    #[error("invalid schema: {0}")]
    Invalid(String),

    /// Template references form a cycle. Fatal.
    #[error("template reference cycle involving '{0}'")]
    TemplateCycle(String),
}

impl Error {
    /// Build an invalid-schema error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<morph_idr::Error> for Error {
    fn from(e: morph_idr::Error) -> Self {
        Self::Invalid(e.to_string())
    }
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;
