//! Length-framed, append-only record file.

use crate::encoding::{self, ByteOrder, LEN_WIDTH};
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An append-only file of length-prefixed records.
///
/// Each record is stored as an 8-byte big-endian length followed by the
/// payload. Writes go through a buffer; every read flushes it first so
/// that a record is readable as soon as [`Store::append`] returns.
///
/// # Thread Safety
///
/// All operations take one internal lock over the file, the write buffer
/// and the size counter. Concurrent callers are serialized.
///
/// # Example
///
/// ```no_run
/// use seglog_storage::Store;
/// use std::path::Path;
///
/// let store = Store::open(Path::new("0.store")).unwrap();
/// let (written, position) = store.append(b"payload").unwrap();
/// assert_eq!(written, 15);
/// assert_eq!(store.read(position).unwrap(), b"payload");
/// store.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    writer: BufWriter<File>,
    size: u64,
}

impl StoreInner {
    fn read_exact_at(&mut self, position: u64, buf: &mut [u8]) -> StorageResult<()> {
        let file = self.writer.get_mut();
        file.seek(SeekFrom::Start(position))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

impl Store {
    /// Opens or creates the store file at `path` in append mode.
    ///
    /// The current file length becomes the store size, so records written
    /// by a previous process stay readable.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or stat'd.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(StoreInner {
                writer: BufWriter::new(file),
                size,
            }),
        })
    }

    /// Appends `payload` as one length-prefixed record.
    ///
    /// Returns `(bytes_written, position)` where `position` is where the
    /// record's length prefix starts and `bytes_written` is
    /// `8 + payload.len()`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the buffer or file fails.
    pub fn append(&self, payload: &[u8]) -> StorageResult<(u64, u64)> {
        let mut inner = self.inner.lock();

        let position = inner.size;
        let mut len = [0u8; LEN_WIDTH as usize];
        encoding::put_u64(&mut len, payload.len() as u64, ByteOrder::Big)?;

        inner.writer.write_all(&len)?;
        inner.writer.write_all(payload)?;

        let written = LEN_WIDTH + payload.len() as u64;
        inner.size += written;

        Ok((written, position))
    }

    /// Reads the payload of the record whose length prefix starts at
    /// `position`.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`StorageError::PositionNotFound`] if no length prefix fits at
    ///   `position`
    /// - [`StorageError::ReadPastEnd`] if the prefix claims more bytes than
    ///   the store holds
    /// - [`StorageError::Io`] if flushing or reading fails
    pub fn read(&self, position: u64) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;

        let size = inner.size;
        if position.saturating_add(LEN_WIDTH) > size {
            return Err(StorageError::PositionNotFound { position, size });
        }

        let mut len = [0u8; LEN_WIDTH as usize];
        inner.read_exact_at(position, &mut len)?;
        let len = encoding::get_u64(&len, ByteOrder::Big)?;

        let start = position + LEN_WIDTH;
        if start.saturating_add(len) > size {
            return Err(StorageError::ReadPastEnd {
                position,
                len,
                size,
            });
        }

        let len = usize::try_from(len).map_err(|_| StorageError::ReadPastEnd {
            position,
            len,
            size,
        })?;
        let mut payload = vec![0u8; len];
        inner.read_exact_at(start, &mut payload)?;

        Ok(payload)
    }

    /// Reads raw bytes starting at `offset` into `buf`, without
    /// interpreting record framing.
    ///
    /// Returns the number of bytes read, which is less than `buf.len()` only
    /// when the end of the file is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or reading fails.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<usize> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;

        let file = inner.writer.get_mut();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(filled)
    }

    /// Pushes buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> StorageResult<()> {
        self.inner.lock().writer.flush()?;
        Ok(())
    }

    /// Flushes buffered writes and syncs file data and metadata to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or sync fails.
    pub fn sync(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        inner.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Discards everything from `new_size` onwards.
    ///
    /// Only used by segment recovery to drop an unindexed or torn tail.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    pub fn truncate(&self, new_size: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;

        if new_size > inner.size {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, inner.size
                ),
            )));
        }

        let file = inner.writer.get_ref();
        file.set_len(new_size)?;
        file.sync_all()?;
        inner.size = new_size;

        Ok(())
    }

    /// Returns the number of bytes written, including buffered bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Returns the path to the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes buffered writes and closes the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails. Data flushed before the
    /// failure stays intact.
    pub fn close(self) -> StorageResult<()> {
        let inner = self.inner.into_inner();
        let file = inner.writer.into_inner().map_err(|e| e.into_error())?;
        drop(file);
        Ok(())
    }
}
