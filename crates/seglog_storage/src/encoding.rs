//! Fixed-width integer encoding shared by the store and index formats.
//!
//! Every function takes its byte order explicitly. Both on-disk formats use
//! [`ByteOrder::Big`]; the parameter exists so callers never rely on an
//! implicit, shared encoder.

use crate::error::{StorageError, StorageResult};

/// Width of the length prefix in front of every store record.
pub const LEN_WIDTH: u64 = 8;

/// Width of the relative offset field of an index entry.
pub const OFFSET_WIDTH: u64 = 4;

/// Width of the store position field of an index entry.
pub const POSITION_WIDTH: u64 = 8;

/// Total width of one index entry.
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

/// Byte order for fixed-width integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Most significant byte first. Used by every seglog file.
    Big,
    /// Least significant byte first.
    Little,
}

/// Encodes `value` into the first 4 bytes of `buf`.
///
/// # Errors
///
/// Returns [`StorageError::Corrupted`] if `buf` is shorter than 4 bytes.
pub fn put_u32(buf: &mut [u8], value: u32, order: ByteOrder) -> StorageResult<()> {
    let bytes = match order {
        ByteOrder::Big => value.to_be_bytes(),
        ByteOrder::Little => value.to_le_bytes(),
    };
    let available = buf.len();
    let dst = buf
        .get_mut(..bytes.len())
        .ok_or_else(|| short_buffer(bytes.len(), available))?;
    dst.copy_from_slice(&bytes);
    Ok(())
}

/// Encodes `value` into the first 8 bytes of `buf`.
///
/// # Errors
///
/// Returns [`StorageError::Corrupted`] if `buf` is shorter than 8 bytes.
pub fn put_u64(buf: &mut [u8], value: u64, order: ByteOrder) -> StorageResult<()> {
    let bytes = match order {
        ByteOrder::Big => value.to_be_bytes(),
        ByteOrder::Little => value.to_le_bytes(),
    };
    let available = buf.len();
    let dst = buf
        .get_mut(..bytes.len())
        .ok_or_else(|| short_buffer(bytes.len(), available))?;
    dst.copy_from_slice(&bytes);
    Ok(())
}

/// Decodes a `u32` from the first 4 bytes of `buf`.
///
/// # Errors
///
/// Returns [`StorageError::Corrupted`] if `buf` is shorter than 4 bytes.
pub fn get_u32(buf: &[u8], order: ByteOrder) -> StorageResult<u32> {
    let bytes: [u8; 4] = buf
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| short_buffer(4, buf.len()))?;
    Ok(match order {
        ByteOrder::Big => u32::from_be_bytes(bytes),
        ByteOrder::Little => u32::from_le_bytes(bytes),
    })
}

/// Decodes a `u64` from the first 8 bytes of `buf`.
///
/// # Errors
///
/// Returns [`StorageError::Corrupted`] if `buf` is shorter than 8 bytes.
pub fn get_u64(buf: &[u8], order: ByteOrder) -> StorageResult<u64> {
    let bytes: [u8; 8] = buf
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| short_buffer(8, buf.len()))?;
    Ok(match order {
        ByteOrder::Big => u64::from_be_bytes(bytes),
        ByteOrder::Little => u64::from_le_bytes(bytes),
    })
}

/// Encodes one index entry into the first [`ENTRY_WIDTH`] bytes of `buf`.
pub fn encode_entry(buf: &mut [u8], relative_offset: u32, position: u64) -> StorageResult<()> {
    if (buf.len() as u64) < ENTRY_WIDTH {
        return Err(short_buffer(ENTRY_WIDTH as usize, buf.len()));
    }
    put_u32(buf, relative_offset, ByteOrder::Big)?;
    put_u64(&mut buf[OFFSET_WIDTH as usize..], position, ByteOrder::Big)
}

/// Decodes one index entry from the first [`ENTRY_WIDTH`] bytes of `buf`.
pub fn decode_entry(buf: &[u8]) -> StorageResult<(u32, u64)> {
    if (buf.len() as u64) < ENTRY_WIDTH {
        return Err(short_buffer(ENTRY_WIDTH as usize, buf.len()));
    }
    let relative_offset = get_u32(buf, ByteOrder::Big)?;
    let position = get_u64(&buf[OFFSET_WIDTH as usize..], ByteOrder::Big)?;
    Ok((relative_offset, position))
}

fn short_buffer(needed: usize, actual: usize) -> StorageError {
    StorageError::Corrupted(format!(
        "buffer too short: need {needed} bytes, have {actual}"
    ))
}
