//! # seglog core
//!
//! Segments for an append-only, offset-indexed commit log.
//!
//! This crate provides:
//! - [`Segment`]: one store file and one index file covering a contiguous
//!   range of offsets, with O(1) reads by offset
//! - [`Record`]: the value/offset schema stored in segments
//! - [`Config`]: the size ceilings that decide when a segment is maxed
//!
//! Creating new segments on rollover, finding the segment for an offset and
//! pruning old segments belong to the log manager built on top of this
//! crate. It needs [`Segment::is_maxed`], [`Segment::next_offset`] and
//! [`parse_base_offset`] for that.

#![warn(missing_docs)]

mod config;
mod error;
mod record;
mod recovery;
mod segment;
mod util;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use record::Record;
pub use recovery::RecoveryReport;
pub use segment::{
    index_file_name, parse_base_offset, store_file_name, Segment, INDEX_EXTENSION,
    STORE_EXTENSION,
};
pub use util::nearest_multiple;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
