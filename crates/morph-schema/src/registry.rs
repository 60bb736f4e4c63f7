//! Handler registry
//!
//! Handlers are supplied as an explicit ordered list of constructors rather
//! than through global registration. On `create`, the registry parses the
//! schema header and offers the document to each constructor in turn; a
//! constructor that does not recognize the family signals
//! [`Error::NotSupported`] and the next one is tried. Any other error is
//! fatal.

use crate::header::Header;
use crate::{Error, Result};
use tracing::debug;

/// Everything a handler constructor may inspect.
pub struct CreateCtx<'a> {
    /// Schema name, used for error decoration.
    pub name: &'a str,
    /// Parsed schema header.
    pub header: &'a Header,
    /// The full schema document.
    pub content: &'a [u8],
}

/// Constructor signature for a handler family.
pub type CreateFn<H> = fn(&CreateCtx<'_>) -> Result<H>;

/// Ordered list of handler constructors.
pub struct HandlerRegistry<H> {
    creators: Vec<CreateFn<H>>,
}

impl<H> HandlerRegistry<H> {
    /// Build a registry from an explicit constructor list.
    pub fn new(creators: Vec<CreateFn<H>>) -> Self {
        Self { creators }
    }

    /// Parse the schema header and construct a handler for `content`.
    pub fn create(&self, name: &str, content: &[u8]) -> Result<H> {
        let header = Header::parse(content)?;
        let ctx = CreateCtx {
            name,
            header: &header,
            content,
        };
        for creator in &self.creators {
            match creator(&ctx) {
                Ok(handler) => {
                    debug!(
                        schema = name,
                        version = %header.parser_settings.version,
                        "schema handler selected"
                    );
                    return Ok(handler);
                }
                Err(Error::NotSupported) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::invalid(format!(
            "no handler supports schema version '{}'",
            header.parser_settings.version
        )))
    }
}
