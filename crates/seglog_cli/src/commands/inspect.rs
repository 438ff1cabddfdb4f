//! Inspect command implementation.

use super::{format_size, open_existing};
use seglog_core::{Config, Segment};
use serde::Serialize;
use std::path::Path;

/// Segment inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store file path.
    pub store_path: String,
    /// Index file path.
    pub index_path: String,
    /// First offset of the segment.
    pub base_offset: u64,
    /// Offset the next append would get.
    pub next_offset: u64,
    /// Number of records.
    pub record_count: u64,
    /// Store size in bytes.
    pub store_size: u64,
    /// Used index size in bytes.
    pub index_size: u64,
    /// Whether the segment has reached a size ceiling.
    pub maxed: bool,
}

impl InspectResult {
    /// Captures the state of an open segment.
    pub fn from_segment(segment: &Segment) -> Self {
        Self {
            store_path: segment.store_path().display().to_string(),
            index_path: segment.index_path().display().to_string(),
            base_offset: segment.base_offset(),
            next_offset: segment.next_offset(),
            record_count: segment.len(),
            store_size: segment.store_size(),
            index_size: segment.index_size(),
            maxed: segment.is_maxed(),
        }
    }
}

/// Runs the inspect command.
pub fn run(
    dir: &Path,
    base_offset: u64,
    config: Config,
    repair: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let segment = open_existing(dir, base_offset, config, repair)?;
    let result = InspectResult::from_segment(&segment);
    segment.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Segment Inspection");
    println!("==================");
    println!();
    println!("Store: {}", result.store_path);
    println!("Index: {}", result.index_path);
    println!();
    println!("Offsets:");
    println!("  Base offset: {}", result.base_offset);
    println!("  Next offset: {}", result.next_offset);
    println!("  Records:     {}", result.record_count);
    println!();
    println!("Storage:");
    println!("  Store size:  {}", format_size(result.store_size));
    println!("  Index size:  {}", format_size(result.index_size));
    println!("  Maxed:       {}", if result.maxed { "yes" } else { "no" });
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_core::Record;
    use tempfile::tempdir;

    #[test]
    fn inspect_reports_offsets_and_sizes() {
        let dir = tempdir().unwrap();
        let config = Config::new().max_index_bytes(24);

        let segment = Segment::open(dir.path(), 5, config.clone()).unwrap();
        segment.append(&mut Record::new(b"ab".to_vec())).unwrap();
        segment.append(&mut Record::new(b"cd".to_vec())).unwrap();

        let result = InspectResult::from_segment(&segment);
        assert_eq!(result.base_offset, 5);
        assert_eq!(result.next_offset, 7);
        assert_eq!(result.record_count, 2);
        assert_eq!(result.store_size, 2 * (8 + 8 + 2));
        assert_eq!(result.index_size, 24);
        assert!(result.maxed);
        segment.close().unwrap();

        run(dir.path(), 5, config, false, "json").unwrap();
    }
}
