//! Dump command implementation.

use super::open_existing;
use seglog_core::{Config, Segment};
use serde::Serialize;
use std::path::Path;

/// Record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Logical offset.
    pub offset: u64,
    /// Value length in bytes.
    pub len: usize,
    /// Value as lossy UTF-8.
    pub value: String,
}

/// Runs the dump command.
pub fn run(
    dir: &Path,
    base_offset: u64,
    config: Config,
    repair: bool,
    start_offset: Option<u64>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let segment = open_existing(dir, base_offset, config, repair)?;
    let records = read_records(&segment, start_offset, limit)?;
    segment.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Reads records from `start_offset` (or the base) up to `next_offset`.
pub fn read_records(
    segment: &Segment,
    start_offset: Option<u64>,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let start = start_offset
        .unwrap_or(segment.base_offset())
        .max(segment.base_offset());
    let limit = limit.unwrap_or(usize::MAX);

    let mut records = Vec::new();
    for offset in (start..segment.next_offset()).take(limit) {
        let record = segment.read(offset)?;
        records.push(RecordInfo {
            offset: record.offset,
            len: record.value.len(),
            value: String::from_utf8_lossy(&record.value).into_owned(),
        });
    }

    Ok(records)
}

fn print_text_output(records: &[RecordInfo]) {
    println!("Segment Records");
    println!("===============");
    println!();

    for record in records {
        println!("[{}] {} bytes: {}", record.offset, record.len, record.value);
    }

    println!();
    println!("Total: {} records", records.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_core::Record;
    use tempfile::tempdir;

    #[test]
    fn read_records_honours_start_and_limit() {
        let dir = tempdir().unwrap();
        let segment = Segment::open(dir.path(), 10, Config::default()).unwrap();
        for value in ["a", "b", "c", "d"] {
            segment.append(&mut Record::new(value.as_bytes())).unwrap();
        }

        let all = read_records(&segment, None, None).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].offset, 10);

        let some = read_records(&segment, Some(11), Some(2)).unwrap();
        let values: Vec<_> = some.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, ["b", "c"]);

        // Offsets below the base are clamped.
        assert_eq!(read_records(&segment, Some(0), Some(1)).unwrap()[0].offset, 10);
    }
}
