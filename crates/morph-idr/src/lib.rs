#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # morph-idr
//!
//! Intermediate Data Representation for the datamorph engine.
//!
//! This crate provides the arena-backed node tree that holds a parsed record
//! while it is being transformed: typed nodes with parent/child/sibling
//! links, subtree copy/detach, a projection into generic JSON-like values,
//! and a restricted XPath dialect for addressing nodes.

/// Projection of IDR subtrees into generic nested values.
pub mod projection;
/// Arena-backed tree with typed nodes and handle-based links.
pub mod tree;
/// Restricted XPath dialect evaluated against the tree.
pub mod xpath;

pub use projection::node_to_value;
pub use tree::{NodeId, NodeKind, Tree};
pub use xpath::{select, CompiledPath};

use thiserror::Error;

/// Errors that can occur when working with the IDR
#[derive(Error, Debug)]
pub enum Error {
    #[error("Node not found at path: {path}")]
    NodeNotFound { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid tree operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Build a node-not-found error with path context.
    pub fn node_not_found(path: impl Into<String>) -> Self {
        Self::NodeNotFound { path: path.into() }
    }

    /// Build an invalid-path error with input path and parsing reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-local result type for IDR operations.
pub type Result<T> = std::result::Result<T, Error>;
