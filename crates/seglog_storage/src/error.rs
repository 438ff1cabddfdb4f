//! Error types for store and index operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store and index operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred while opening, sizing, mapping, syncing or
    /// closing a file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested index entry was never written.
    #[error("index entry {entry} not found: index holds {entries} entries")]
    EntryNotFound {
        /// The requested entry number, or the last-entry sentinel.
        entry: i64,
        /// Number of entries currently written.
        entries: u64,
    },

    /// The requested store position lies at or beyond the end of the store.
    #[error("store position {position} not found: store size {size}")]
    PositionNotFound {
        /// The requested position.
        position: u64,
        /// The current store size.
        size: u64,
    },

    /// A record's length prefix points past the end of the store.
    #[error("record at position {position} reads past end of store: len {len}, size {size}")]
    ReadPastEnd {
        /// Position of the record's length prefix.
        position: u64,
        /// Payload length read from the prefix.
        len: u64,
        /// The current store size.
        size: u64,
    },

    /// An index entry's relative offset does not match its slot.
    #[error("out-of-order index entry: expected relative offset {expected}, got {actual}")]
    OutOfOrder {
        /// Relative offset the next slot must carry.
        expected: u64,
        /// Relative offset that was supplied.
        actual: u32,
    },

    /// The index cannot take another entry.
    #[error("index full: capacity {capacity} bytes, {size} bytes used")]
    IndexFull {
        /// Bytes available in the mapped region.
        capacity: u64,
        /// Bytes already used.
        size: u64,
    },

    /// A file or buffer does not have the expected layout.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Returns true if the error means "no such entry or record".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EntryNotFound { .. } | Self::PositionNotFound { .. } | Self::ReadPastEnd { .. }
        )
    }

    /// Returns true if the error is the index capacity signal.
    #[must_use]
    pub fn is_index_full(&self) -> bool {
        matches!(self, Self::IndexFull { .. })
    }
}
