//! Segment configuration.

use crate::error::{CoreError, CoreResult};
use crate::util::nearest_multiple;
use seglog_storage::ENTRY_WIDTH;
use serde::{Deserialize, Serialize};

/// Size limits and starting offset for segments.
///
/// Supplied by the log manager that owns the segments. Missing fields take
/// their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store size at which a segment reports itself maxed.
    pub max_store_bytes: u64,

    /// Index size at which a segment reports itself maxed. Also the size the
    /// index file is preallocated to.
    pub max_index_bytes: u64,

    /// Base offset of the first segment of a fresh log.
    pub initial_offset: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_store_bytes: 64 * 1024 * 1024, // 64 MB
            // 1 MB rounded down to whole entries: 87381 entries
            max_index_bytes: nearest_multiple(1024 * 1024, ENTRY_WIDTH),
            initial_offset: 0,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store size ceiling.
    #[must_use]
    pub const fn max_store_bytes(mut self, bytes: u64) -> Self {
        self.max_store_bytes = bytes;
        self
    }

    /// Sets the index size ceiling.
    #[must_use]
    pub const fn max_index_bytes(mut self, bytes: u64) -> Self {
        self.max_index_bytes = bytes;
        self
    }

    /// Sets the initial offset of a fresh log.
    #[must_use]
    pub const fn initial_offset(mut self, offset: u64) -> Self {
        self.initial_offset = offset;
        self
    }

    /// Number of entries that fit under the index ceiling.
    #[must_use]
    pub const fn max_index_entries(&self) -> u64 {
        self.max_index_bytes / ENTRY_WIDTH
    }

    /// Index ceiling rounded down to whole entries.
    ///
    /// The index is full once this many bytes are used, whatever the raw
    /// `max_index_bytes` value.
    #[must_use]
    pub const fn aligned_max_index_bytes(&self) -> u64 {
        nearest_multiple(self.max_index_bytes, ENTRY_WIDTH)
    }

    /// Checks that a segment can be opened with this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the store ceiling is zero or
    /// the index ceiling cannot hold a single entry.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_store_bytes == 0 {
            return Err(CoreError::invalid_config("max_store_bytes must be non-zero"));
        }
        if self.max_index_bytes < ENTRY_WIDTH {
            return Err(CoreError::invalid_config(format!(
                "max_index_bytes must hold at least one {ENTRY_WIDTH}-byte entry, got {}",
                self.max_index_bytes
            )));
        }
        Ok(())
    }
}
