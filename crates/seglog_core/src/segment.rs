//! Segments: one store and one index covering a contiguous offset range.
//!
//! ## Files
//!
//! ```text
//! <dir>/
//! ├─ <base_offset>.store   # length-framed encoded records
//! └─ <base_offset>.index   # 12-byte (relative offset, position) entries
//! ```
//!
//! A segment's offsets run from `base_offset` up to, but excluding,
//! `next_offset`. Entry `i` of the index describes offset `base_offset + i`.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::recovery::{self, IndexSnapshot, RecoveryReport};
use parking_lot::Mutex;
use seglog_storage::{Index, StorageError, Store, LAST_ENTRY};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Extension of store files.
pub const STORE_EXTENSION: &str = "store";

/// Extension of index files.
pub const INDEX_EXTENSION: &str = "index";

/// Returns the store file name for a segment starting at `base_offset`.
#[must_use]
pub fn store_file_name(base_offset: u64) -> String {
    format!("{base_offset}.{STORE_EXTENSION}")
}

/// Returns the index file name for a segment starting at `base_offset`.
#[must_use]
pub fn index_file_name(base_offset: u64) -> String {
    format!("{base_offset}.{INDEX_EXTENSION}")
}

/// Extracts the base offset from a segment store or index file path.
///
/// Returns `None` for any other file, so a directory listing can be fed
/// through this directly.
#[must_use]
pub fn parse_base_offset(path: &Path) -> Option<u64> {
    let extension = path.extension()?.to_str()?;
    if extension != STORE_EXTENSION && extension != INDEX_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

/// A store and index pair holding records `base_offset..next_offset`.
///
/// # Thread Safety
///
/// Appends are serialized by an internal lock, so the store write and the
/// index write of one record are never interleaved with another append.
/// Reads do not take the append lock and may run alongside an append.
///
/// # Lifecycle
///
/// A segment is active from [`Segment::open`] until it is consumed by
/// [`Segment::close`] (files kept) or [`Segment::remove`] (files deleted).
/// Dropping a segment without closing leaves the index file at its
/// preallocated length; the next open recovers from that.
///
/// # Example
///
/// ```rust
/// use seglog_core::{Config, Record, Segment};
///
/// let dir = tempfile::tempdir().unwrap();
/// let config = Config::new().max_store_bytes(1024).max_index_bytes(120);
/// let segment = Segment::open(dir.path(), 16, config).unwrap();
///
/// let mut record = Record::new(b"hello".to_vec());
/// let offset = segment.append(&mut record).unwrap();
/// assert_eq!(offset, 16);
/// assert_eq!(segment.read(16).unwrap().value, b"hello");
///
/// segment.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Segment {
    store: Store,
    index: Index,
    base_offset: u64,
    /// Offset for the next append. Held for the whole append.
    next_offset: Mutex<u64>,
    config: Config,
}

impl Segment {
    /// Opens or creates the segment starting at `base_offset` in `dir`.
    ///
    /// Existing files are reconciled before use: index entries without a
    /// complete store record are dropped, complete store records the index
    /// never saw are indexed while it has room, and a torn store tail is
    /// truncated. `next_offset` then equals `base_offset` plus the number of
    /// readable records. Use [`Segment::check`] to see what would change
    /// without changing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or any file cannot
    /// be opened, resized, mapped or repaired.
    pub fn open(dir: &Path, base_offset: u64, config: Config) -> CoreResult<Self> {
        config.validate()?;

        let store = Store::open(&dir.join(store_file_name(base_offset)))?;
        let index = Index::open(&dir.join(index_file_name(base_offset)), config.max_index_bytes)?;

        recovery::reconcile(&store, &index, base_offset)?;

        let next_offset = match index.read(LAST_ENTRY) {
            Ok((relative_offset, _)) => {
                recovery::offset_at(base_offset, u64::from(relative_offset) + 1)?
            }
            Err(e) if e.is_not_found() => base_offset,
            Err(e) => return Err(e.into()),
        };

        info!(
            base_offset,
            next_offset,
            store_size = store.size(),
            index_size = index.size(),
            "opened segment"
        );

        Ok(Self {
            store,
            index,
            base_offset,
            next_offset: Mutex::new(next_offset),
            config,
        })
    }

    /// Reports what [`Segment::open`] would repair, without changing any
    /// file.
    ///
    /// The index file is read rather than mapped, so it is neither
    /// preallocated nor trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the store file is
    /// missing, or either file cannot be read.
    pub fn check(dir: &Path, base_offset: u64, config: &Config) -> CoreResult<RecoveryReport> {
        config.validate()?;

        let store_path = dir.join(store_file_name(base_offset));
        if !store_path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no store file at {}", store_path.display()),
            )
            .into());
        }

        let store = Store::open(&store_path)?;
        let index = IndexSnapshot::read(
            &dir.join(index_file_name(base_offset)),
            config.max_index_bytes,
        )?;

        let report = recovery::plan(&store, &index, base_offset)?.report();
        store.close()?;

        debug!(base_offset, ?report, "checked segment");
        Ok(report)
    }

    /// Appends a record, stamping it with the next offset.
    ///
    /// Returns the assigned offset. `next_offset` advances, and
    /// `record.offset` is set, only when both the store and the index write
    /// succeed.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - an index-full error (see [`CoreError::is_index_full`]) when the
    ///   index has no room; the store is left untouched
    /// - [`CoreError::InvalidOperation`] if the relative offset no longer
    ///   fits the index's 4-byte field, or the offset after this one would
    ///   overflow `u64`
    /// - any store or index I/O error
    ///
    /// If the index write fails after the store write succeeded, the store
    /// keeps an unindexed record. It is never readable through this
    /// segment, and the next [`Segment::open`] either indexes or truncates
    /// it.
    pub fn append(&self, record: &mut Record) -> CoreResult<u64> {
        let mut next_offset = self.next_offset.lock();

        let relative_offset = u32::try_from(*next_offset - self.base_offset).map_err(|_| {
            CoreError::invalid_operation(format!(
                "offset {} is too far from segment base {}",
                *next_offset, self.base_offset
            ))
        })?;

        if self.index.is_full() {
            debug!(
                base_offset = self.base_offset,
                next_offset = *next_offset,
                "segment index full"
            );
            return Err(StorageError::IndexFull {
                capacity: self.index.capacity(),
                size: self.index.size(),
            }
            .into());
        }

        let offset = *next_offset;
        let following = offset.checked_add(1).ok_or_else(|| {
            CoreError::invalid_operation(format!("no offset left after {offset}"))
        })?;

        let (_, position) = self.store.append(&record.encode_at(offset))?;
        self.index.write(relative_offset, position)?;

        record.offset = offset;
        *next_offset = following;
        Ok(offset)
    }

    /// Reads the record stored at `offset`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error (see [`CoreError::is_not_found`]) if the
    /// offset is below `base_offset` or was never appended here, a
    /// serialization error if the stored bytes do not decode, or any I/O
    /// error.
    pub fn read(&self, offset: u64) -> CoreResult<Record> {
        let out_of_range = || CoreError::OffsetOutOfRange {
            offset,
            base_offset: self.base_offset,
        };

        let relative_offset = offset
            .checked_sub(self.base_offset)
            .ok_or_else(out_of_range)?;
        let entry = i64::try_from(relative_offset).map_err(|_| out_of_range())?;

        let (_, position) = self.index.read(entry)?;
        let bytes = self.store.read(position)?;
        Record::decode(&bytes)
    }

    /// Returns true once the store or the index has reached its ceiling.
    ///
    /// The store is compared against `max_store_bytes` and the index
    /// against `max_index_bytes` rounded down to whole entries, the point
    /// at which it refuses appends. Sizes only grow, so a maxed segment
    /// stays maxed.
    #[must_use]
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.max_store_bytes
            || self.index.size() >= self.config.aligned_max_index_bytes()
            || self.index.is_full()
    }

    /// Pushes buffered store writes to the OS and msyncs the index.
    ///
    /// # Errors
    ///
    /// Returns an error if either flush fails.
    pub fn flush(&self) -> CoreResult<()> {
        self.store.flush()?;
        self.index.flush()?;
        Ok(())
    }

    /// Returns the offset of the first record this segment holds.
    #[must_use]
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Returns the offset the next append will be assigned.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        *self.next_offset.lock()
    }

    /// Returns the number of records in the segment.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.next_offset() - self.base_offset
    }

    /// Returns true if no record has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the store size in bytes.
    #[must_use]
    pub fn store_size(&self) -> u64 {
        self.store.size()
    }

    /// Returns the used index size in bytes.
    #[must_use]
    pub fn index_size(&self) -> u64 {
        self.index.size()
    }

    /// Returns the path of the store file.
    #[must_use]
    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    /// Returns the path of the index file.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        self.index.name()
    }

    /// Returns the configuration the segment was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Closes the index and store, keeping both files.
    ///
    /// The index file is trimmed to its used size.
    ///
    /// # Errors
    ///
    /// Returns the first error hit; the store is not closed if the index
    /// close fails.
    pub fn close(self) -> CoreResult<()> {
        let base_offset = self.base_offset;
        self.index.close()?;
        self.store.close()?;
        debug!(base_offset, "closed segment");
        Ok(())
    }

    /// Closes the segment and deletes its index and store files.
    ///
    /// # Errors
    ///
    /// Returns the first error hit and skips the remaining steps, so the
    /// index may be gone while the store remains. Reopening the same base
    /// offset treats such a store as unindexed data.
    pub fn remove(self) -> CoreResult<()> {
        let base_offset = self.base_offset;
        let index_path = self.index.name().to_path_buf();
        let store_path = self.store.path().to_path_buf();

        self.index.close()?;
        self.store.close()?;
        fs::remove_file(&index_path)?;
        fs::remove_file(&store_path)?;

        debug!(base_offset, "removed segment");
        Ok(())
    }
}
