//! Engine error model
//!
//! One flat kind enumeration for everything the engine surfaces. Fatal
//! kinds corrupt or exhaust the reader's position and are sticky: after one
//! is returned, every later `Read` returns it again. Record-level kinds
//! affect a single output record; the caller consults
//! [`EngineError::is_continuable`] to decide whether to keep reading.

use thiserror::Error;

/// Every error kind the engine surfaces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No registered handler recognizes the schema family. Recoverable
    /// inside the registry only.
    #[error("schema not supported")]
    SchemaNotSupported,

    /// The schema document is malformed.
    #[error("invalid schema: {0}")]
    SchemaInvalid(String),

    /// Template references in the schema form a cycle.
    #[error("template reference cycle involving '{0}'")]
    TemplateCycle(String),

    /// Format-level input corruption or stream failure.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Structurally corrupt EDI content.
    #[error("invalid EDI: {0}")]
    InvalidEdi(String),

    /// A raw record matched no eligible record declaration.
    #[error("unexpected record: {message}")]
    UnexpectedRecord { message: String, continuable: bool },

    /// The input ended while a record hierarchy was still open.
    #[error("incomplete stream: {0}")]
    IncompleteStream(String),

    /// A non-optional field path selected nothing.
    #[error("no match for field path '{0}'")]
    FieldMissing(String),

    /// The caller did not supply a referenced external value.
    #[error("missing external value '{0}'")]
    MissingExternal(String),

    /// A declaration invoked an unregistered custom function.
    #[error("unknown custom function '{0}'")]
    UnknownCustomFunc(String),

    /// A custom function returned an error.
    #[error("custom function failed: {0}")]
    CustomFuncFailed(String),
}

impl EngineError {
    /// True when ingestion may proceed past this error: the fault affects a
    /// single record and the reader's position is intact.
    pub fn is_continuable(&self) -> bool {
        match self {
            Self::UnexpectedRecord { continuable, .. } => *continuable,
            Self::FieldMissing(_) | Self::CustomFuncFailed(_) => true,
            _ => false,
        }
    }
}

impl From<morph_format_edi::Error> for EngineError {
    fn from(e: morph_format_edi::Error) -> Self {
        match e {
            morph_format_edi::Error::InvalidInput(m) => Self::InvalidInput(m),
            morph_format_edi::Error::InvalidEdi { .. } => Self::InvalidEdi(e.to_string()),
        }
    }
}

impl From<morph_format_flat::Error> for EngineError {
    fn from(e: morph_format_flat::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<morph_idr::Error> for EngineError {
    fn from(e: morph_idr::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<morph_schema::Error> for EngineError {
    fn from(e: morph_schema::Error) -> Self {
        match e {
            morph_schema::Error::NotSupported => Self::SchemaNotSupported,
            morph_schema::Error::Invalid(m) => Self::SchemaInvalid(m),
            morph_schema::Error::TemplateCycle(name) => Self::TemplateCycle(name),
        }
    }
}

impl From<morph_transform::Error> for EngineError {
    fn from(e: morph_transform::Error) -> Self {
        match e {
            morph_transform::Error::FieldMissing { path } => Self::FieldMissing(path),
            morph_transform::Error::MissingExternal(name) => Self::MissingExternal(name),
            morph_transform::Error::UnknownCustomFunc(name) => Self::UnknownCustomFunc(name),
            morph_transform::Error::CustomFuncFailed { name, message } => {
                Self::CustomFuncFailed(format!("{name}: {message}"))
            }
        }
    }
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, EngineError>;
