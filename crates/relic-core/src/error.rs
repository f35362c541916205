//! Error types and result aliases for Relic.
//!
//! This module defines the shared error types used across all Relic
//! components. Errors are structured for programmatic handling and include
//! context for debugging.

use std::fmt;

/// The result type used throughout Relic.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Relic operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid digest string was provided.
    #[error("invalid digest: {message}")]
    InvalidDigest {
        /// Description of what made the digest invalid.
        message: String,
    },

    /// An index store operation failed (transaction, disk, corruption).
    #[error("store error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// The requested schema, digest, or link target is absent from the index.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A manifest could not be ingested.
    #[error("ingest failed: {message}")]
    Ingest {
        /// Description of the ingest failure.
        message: String,
    },

    /// The operation was cancelled before it could complete.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new ingest error with the given message.
    #[must_use]
    pub fn ingest(message: impl Into<String>) -> Self {
        Self::Ingest {
            message: message.into(),
        }
    }

    /// Creates a new invalid-digest error for the given input.
    #[must_use]
    pub fn invalid_digest(input: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::InvalidDigest {
            message: format!("{input}: {reason}"),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            message: value.to_string(),
        }
    }
}
