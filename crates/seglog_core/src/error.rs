//! Error types for seglog core.

use seglog_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in segment operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store or index error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error outside the store and index, e.g. removing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// The configuration cannot back a segment.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The offset lies below the segment's base offset.
    #[error("offset {offset} is below segment base offset {base_offset}")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u64,
        /// The segment's base offset.
        base_offset: u64,
    },

    /// Operation not permitted in the segment's current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if no record exists for the requested offset.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_not_found(),
            Self::OffsetOutOfRange { .. } => true,
            _ => false,
        }
    }

    /// Returns true if the segment's index has no room left.
    ///
    /// This is a rollover signal, not a failure of the log.
    #[must_use]
    pub fn is_index_full(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_index_full())
    }
}
