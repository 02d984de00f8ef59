//! Error types for pag-ir
//!
//! Provides unified error handling across the crate.
//!
//! Programming errors (duplicate pre-registration, missing symbol lookups,
//! malformed gep indices) are fatal assertions, not `PagError` variants: the
//! builder is a one-shot pipeline and such states mean the input walk itself
//! is broken.

use thiserror::Error;

/// Main error type for pag-ir operations
#[derive(Debug, Error)]
pub enum PagError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (serialized PAG text format)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Build error (module-level inconsistency surfaced to the driver)
    #[error("Build error: {0}")]
    Build(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PagError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        PagError::Parse(msg.into())
    }

    /// Create a build error
    pub fn build(msg: impl Into<String>) -> Self {
        PagError::Build(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        PagError::Config(msg.into())
    }
}

/// Result type alias for pag-ir operations
pub type Result<T> = std::result::Result<T, PagError>;
