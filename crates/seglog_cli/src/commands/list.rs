//! List command implementation.

use super::format_size;
use seglog_core::{index_file_name, parse_base_offset, store_file_name};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// One segment found in the log directory.
#[derive(Debug, Serialize)]
pub struct SegmentEntry {
    /// Base offset parsed from the file name.
    pub base_offset: u64,
    /// Store file size, if the store file exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_size: Option<u64>,
    /// Index file size, if the index file exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_size: Option<u64>,
}

impl SegmentEntry {
    /// Returns true if only one of the two files exists, as left behind by
    /// an interrupted remove.
    pub fn is_partial(&self) -> bool {
        self.store_size.is_none() || self.index_size.is_none()
    }
}

/// Runs the list command.
pub fn run(dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let segments = scan(dir)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&segments)?);
        }
        _ => {
            print_text_output(dir, &segments);
        }
    }

    Ok(())
}

/// Collects every segment base offset in `dir`, in offset order.
pub fn scan(dir: &Path) -> Result<Vec<SegmentEntry>, Box<dyn std::error::Error>> {
    let mut bases = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        if let Some(base) = parse_base_offset(&entry?.path()) {
            bases.insert(base);
        }
    }

    let size_of = |name: String| fs::metadata(dir.join(name)).ok().map(|m| m.len());

    Ok(bases
        .into_iter()
        .map(|base_offset| SegmentEntry {
            base_offset,
            store_size: size_of(store_file_name(base_offset)),
            index_size: size_of(index_file_name(base_offset)),
        })
        .collect())
}

fn print_text_output(dir: &Path, segments: &[SegmentEntry]) {
    println!("Segments in {:?}", dir);
    println!();

    if segments.is_empty() {
        println!("  (none)");
        return;
    }

    for segment in segments {
        let size = |s: Option<u64>| s.map_or_else(|| "missing".to_string(), format_size);
        print!(
            "  [{}] store {}, index {}",
            segment.base_offset,
            size(segment.store_size),
            size(segment.index_size)
        );
        if segment.is_partial() {
            print!("  (partial)");
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scan_groups_files_by_base_offset() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("0.store"), b"").unwrap();
        fs::write(dir.path().join("0.index"), b"").unwrap();
        fs::write(dir.path().join("10.store"), b"abc").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let segments = scan(dir.path()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].base_offset, 0);
        assert!(!segments[0].is_partial());
        assert_eq!(segments[1].base_offset, 10);
        assert_eq!(segments[1].store_size, Some(3));
        assert!(segments[1].is_partial());
    }
}
