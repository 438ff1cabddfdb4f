//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod list;
pub mod verify;

use seglog_core::{store_file_name, Config, Segment};
use std::path::Path;

/// Opens an existing segment. Refuses to create one that is not there.
///
/// Opening reconciles the store and index, which can drop index entries and
/// truncate a torn store tail. Unless `repair` is set, the segment is
/// checked first and not opened if that would change anything.
pub fn open_existing(
    dir: &Path,
    base_offset: u64,
    config: Config,
    repair: bool,
) -> Result<Segment, Box<dyn std::error::Error>> {
    if !dir.join(store_file_name(base_offset)).exists() {
        return Err(format!(
            "No segment with base offset {} found in {:?}",
            base_offset, dir
        )
        .into());
    }

    if !repair {
        let report = Segment::check(dir, base_offset, &config)?;
        if report.needs_repair() {
            return Err(format!(
                "Segment {} needs recovery ({} dangling index entries, {} records to re-index, \
                 {} torn bytes); rerun with --repair to fix it",
                base_offset, report.dropped_entries, report.reindexed, report.truncated_bytes
            )
            .into());
        }
    }

    Ok(Segment::open(dir, base_offset, config)?)
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_core::Record;
    use tempfile::tempdir;

    #[test]
    fn open_existing_refuses_missing_segment() {
        let dir = tempdir().unwrap();
        assert!(open_existing(dir.path(), 0, Config::default(), false).is_err());
        assert!(!dir.path().join("0.index").exists());

        let segment = Segment::open(dir.path(), 0, Config::default()).unwrap();
        segment.append(&mut Record::new(b"x".to_vec())).unwrap();
        segment.close().unwrap();

        let segment = open_existing(dir.path(), 0, Config::default(), false).unwrap();
        assert_eq!(segment.next_offset(), 1);
    }

    #[test]
    fn open_existing_leaves_damaged_segment_alone() {
        let dir = tempdir().unwrap();
        let segment = Segment::open(dir.path(), 0, Config::default()).unwrap();
        for _ in 0..2 {
            segment.append(&mut Record::new(b"value".to_vec())).unwrap();
        }
        segment.close().unwrap();

        let store_path = dir.path().join(store_file_name(0));
        let torn_len = std::fs::metadata(&store_path).unwrap().len() - 2;
        std::fs::OpenOptions::new()
            .write(true)
            .open(&store_path)
            .unwrap()
            .set_len(torn_len)
            .unwrap();

        let err = open_existing(dir.path(), 0, Config::default(), false).unwrap_err();
        assert!(err.to_string().contains("--repair"));
        assert_eq!(std::fs::metadata(&store_path).unwrap().len(), torn_len);

        let segment = open_existing(dir.path(), 0, Config::default(), true).unwrap();
        assert_eq!(segment.next_offset(), 1);
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(12), "12 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
