//! # seglog storage
//!
//! The two files behind every seglog segment.
//!
//! Neither type knows anything about record schemas or logical offsets
//! beyond the relative offset stored in an index entry. Interpreting the
//! bytes is the segment's job.
//!
//! ## On-disk formats
//!
//! ```text
//! <base>.store   | len (8, BE) | payload (len) | len (8, BE) | payload | ...
//! <base>.index   | rel_offset (4, BE) | position (8, BE) | ...   (12 bytes each)
//! ```
//!
//! The index file is preallocated to its configured capacity while open and
//! truncated back to the bytes actually used on [`Index::close`].
//!
//! ## Example
//!
//! ```rust
//! use seglog_storage::{Index, Store};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = Store::open(&dir.path().join("0.store")).unwrap();
//! let index = Index::open(&dir.path().join("0.index"), 1024).unwrap();
//!
//! let (_, position) = store.append(b"hello world").unwrap();
//! index.write(0, position).unwrap();
//!
//! let (_, position) = index.read(-1).unwrap();
//! assert_eq!(store.read(position).unwrap(), b"hello world");
//!
//! index.close().unwrap();
//! store.close().unwrap();
//! ```

#![warn(missing_docs)]

pub mod encoding;
mod error;
mod index;
mod store;

pub use encoding::{ENTRY_WIDTH, LEN_WIDTH, OFFSET_WIDTH, POSITION_WIDTH};
pub use error::{StorageError, StorageResult};
pub use index::{scan_used_size, Index, LAST_ENTRY};
pub use store::Store;
