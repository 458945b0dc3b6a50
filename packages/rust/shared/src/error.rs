//! Error types for Ushanka.
//!
//! Library crates use [`UshankaError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Ushanka operations.
#[derive(Debug, thiserror::Error)]
pub enum UshankaError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the Storage Service, ArchivesSpace, or Fedora.
    #[error("network error: {0}")]
    Network(String),

    /// METS/MODS/RDF parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Local ingest-registry (database) error.
    #[error("registry error: {0}")]
    Registry(String),

    /// Repository deposit error (Fedora object or datastream rejected).
    #[error("deposit error: {0}")]
    Deposit(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data-model validation error (datastream set, RELS-EXT shape, vocabulary).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, UshankaError>;

impl UshankaError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = UshankaError::config("missing ArchivesSpace password");
        assert_eq!(
            err.to_string(),
            "config error: missing ArchivesSpace password"
        );

        let err = UshankaError::validation("CompoundObject test:27 is missing METS");
        assert!(err.to_string().contains("missing METS"));
    }
}
