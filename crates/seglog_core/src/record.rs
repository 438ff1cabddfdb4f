//! Record schema stored in segments.
//!
//! ## Encoding
//!
//! ```text
//! | offset (8, BE) | value (N) |
//! ```
//!
//! The store frames each encoded record with its length, so the value runs
//! to the end of the frame.

use crate::error::{CoreError, CoreResult};
use seglog_storage::encoding::{self, ByteOrder};

/// A log record: an opaque value and the offset the segment assigned it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Record payload.
    pub value: Vec<u8>,
    /// Logical offset. Set by [`crate::Segment::append`], never by callers.
    pub offset: u64,
}

impl Record {
    /// Width of the encoded offset field.
    const OFFSET_SIZE: usize = 8;

    /// Creates a record that has not been appended yet.
    #[must_use]
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            offset: 0,
        }
    }

    /// Encodes the record to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        self.encode_at(self.offset)
    }

    /// Encodes the value as if the record carried `offset`.
    pub(crate) fn encode_at(&self, offset: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.extend_from_slice(&offset.to_be_bytes());
        buf.extend_from_slice(&self.value);
        buf
    }

    /// Decodes a record from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if `data` is too short to hold
    /// the offset field.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < Self::OFFSET_SIZE {
            return Err(CoreError::serialization(format!(
                "record too short: {} bytes, need at least {}",
                data.len(),
                Self::OFFSET_SIZE
            )));
        }

        let offset = encoding::get_u64(data, ByteOrder::Big)
            .map_err(|e| CoreError::serialization(e.to_string()))?;

        Ok(Self {
            value: data[Self::OFFSET_SIZE..].to_vec(),
            offset,
        })
    }

    /// Returns the encoded size of this record.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::OFFSET_SIZE + self.value.len()
    }
}

impl From<Vec<u8>> for Record {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for Record {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}
