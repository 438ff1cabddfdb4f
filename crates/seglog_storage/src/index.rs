//! Memory-mapped table of fixed-width offset entries.

use crate::encoding::{self, ENTRY_WIDTH};
use crate::error::{StorageError, StorageResult};
use memmap2::MmapMut;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Sentinel accepted by [`Index::read`] meaning "the last written entry".
pub const LAST_ENTRY: i64 = -1;

/// Maps relative offsets to store positions through a memory-mapped file.
///
/// Each entry is 12 bytes: a 4-byte big-endian relative offset followed by
/// an 8-byte big-endian store position. Entry `i` always carries relative
/// offset `i`, so lookups never scan.
///
/// A mapping cannot grow, so the file is extended to its full capacity at
/// open time and truncated back to the bytes actually used by
/// [`Index::close`]. An index that was never closed (crash) is found at
/// its preallocated length; [`Index::open`] re-derives the used size from
/// the entries themselves rather than from the file length.
///
/// # Thread Safety
///
/// Reads share a lock, writes take it exclusively. The size counter and the
/// mapped bytes are never touched outside the lock.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    inner: RwLock<IndexInner>,
}

#[derive(Debug)]
struct IndexInner {
    file: File,
    mmap: MmapMut,
    size: u64,
}

impl IndexInner {
    fn entries(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }

    fn capacity(&self) -> u64 {
        self.mmap.len() as u64
    }
}

impl Index {
    /// Opens or creates the index file at `path` and maps it read/write.
    ///
    /// The file is extended to `max_index_bytes` before mapping. A file that
    /// is already longer keeps its length; the extra entries simply leave no
    /// room for new ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, stat'd, resized or
    /// mapped.
    pub fn open(path: &Path, max_index_bytes: u64) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let existing = file.metadata()?.len();
        let capacity = existing.max(max_index_bytes);
        file.set_len(capacity)?;

        // SAFETY: the file is opened read/write and owned by this index for
        // the lifetime of the mapping. It is only resized after the mapping
        // is dropped in `close`. Other processes must not modify a segment
        // that is open here; the log manager owns each segment exclusively.
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let size = scan_used_size(&mmap[..existing as usize])?;

        Ok(Self {
            path: path.to_path_buf(),
            inner: RwLock::new(IndexInner { file, mmap, size }),
        })
    }

    /// Reads an entry, returning `(relative_offset, position)`.
    ///
    /// `entry` is the literal entry number, or [`LAST_ENTRY`] for the most
    /// recently written one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::EntryNotFound`] if the index is empty or the
    /// entry was never written.
    pub fn read(&self, entry: i64) -> StorageResult<(u32, u64)> {
        let inner = self.inner.read();
        let entries = inner.entries();
        let not_found = || StorageError::EntryNotFound { entry, entries };

        if entries == 0 {
            return Err(not_found());
        }

        let slot = if entry == LAST_ENTRY {
            entries - 1
        } else {
            u64::try_from(entry).map_err(|_| not_found())?
        };

        if slot >= entries {
            return Err(not_found());
        }

        let start = (slot * ENTRY_WIDTH) as usize;
        encoding::decode_entry(&inner.mmap[start..start + ENTRY_WIDTH as usize])
    }

    /// Appends an entry for `relative_offset` at store `position`.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`StorageError::IndexFull`] if the mapped region has no room for
    ///   another entry; nothing is written
    /// - [`StorageError::OutOfOrder`] if `relative_offset` is not the next
    ///   entry number
    pub fn write(&self, relative_offset: u32, position: u64) -> StorageResult<()> {
        let mut inner = self.inner.write();

        if inner.capacity() < inner.size + ENTRY_WIDTH {
            return Err(StorageError::IndexFull {
                capacity: inner.capacity(),
                size: inner.size,
            });
        }

        let expected = inner.entries();
        if u64::from(relative_offset) != expected {
            return Err(StorageError::OutOfOrder {
                expected,
                actual: relative_offset,
            });
        }

        let start = inner.size as usize;
        encoding::encode_entry(
            &mut inner.mmap[start..start + ENTRY_WIDTH as usize],
            relative_offset,
            position,
        )?;
        inner.size += ENTRY_WIDTH;

        Ok(())
    }

    /// Drops every entry from `entries` onwards and zeroes their bytes.
    ///
    /// Used by segment recovery when trailing entries point at store
    /// records that never reached disk.
    ///
    /// # Errors
    ///
    /// Returns an error if `entries` exceeds the number of written entries.
    pub fn truncate_entries(&self, entries: u64) -> StorageResult<()> {
        let mut inner = self.inner.write();

        let written = inner.entries();
        if entries > written {
            return Err(StorageError::EntryNotFound {
                entry: i64::try_from(entries).unwrap_or(i64::MAX),
                entries: written,
            });
        }

        let new_size = entries * ENTRY_WIDTH;
        let (start, end) = (new_size as usize, inner.size as usize);
        inner.mmap[start..end].fill(0);
        inner.size = new_size;

        Ok(())
    }

    /// Returns true if no further entry fits in the mapped region.
    #[must_use]
    pub fn is_full(&self) -> bool {
        let inner = self.inner.read();
        inner.capacity() < inner.size + ENTRY_WIDTH
    }

    /// Returns the number of bytes used by written entries.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.read().size
    }

    /// Returns the number of written entries.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.inner.read().entries()
    }

    /// Returns the length of the mapped region in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.inner.read().capacity()
    }

    /// Returns the path to the index file.
    #[must_use]
    pub fn name(&self) -> &Path {
        &self.path
    }

    /// Writes dirty mapped pages back to the file without closing.
    ///
    /// # Errors
    ///
    /// Returns an error if the msync fails.
    pub fn flush(&self) -> StorageResult<()> {
        self.inner.read().mmap.flush()?;
        Ok(())
    }

    /// Syncs the mapping and the file, trims the file to the used size and
    /// closes it.
    ///
    /// The mapping is released before the file is resized.
    ///
    /// # Errors
    ///
    /// Returns an error if any sync or the truncation fails.
    pub fn close(self) -> StorageResult<()> {
        let IndexInner { file, mmap, size } = self.inner.into_inner();

        mmap.flush()?;
        drop(mmap);

        file.sync_all()?;
        file.set_len(size)?;

        Ok(())
    }
}

/// Returns the bytes used by the leading well-formed entries of `buf`.
///
/// An entry is well-formed when it sits in slot `i`, carries relative
/// offset `i` and its position is past the previous entry's. The zeroed
/// preallocated tail of an index that was never closed fails this check
/// from slot 1 on. A zeroed slot 0 is indistinguishable from a real first
/// entry; the segment settles that against its store.
///
/// Used by [`Index::open`], and usable on the raw bytes of an index file
/// that should not be mapped or modified.
pub fn scan_used_size(buf: &[u8]) -> StorageResult<u64> {
    let limit = buf.len() as u64;
    let mut entries = 0u64;
    let mut previous: Option<u64> = None;

    while (entries + 1) * ENTRY_WIDTH <= limit {
        let start = (entries * ENTRY_WIDTH) as usize;
        let (relative_offset, position) = encoding::decode_entry(&buf[start..])?;

        if u64::from(relative_offset) != entries {
            break;
        }
        if previous.is_some_and(|p| position <= p) {
            break;
        }

        previous = Some(position);
        entries += 1;
    }

    Ok(entries * ENTRY_WIDTH)
}
