//! Property tests for append/read across restarts.

use proptest::prelude::*;
use seglog_core::{Config, Record, Segment};
use tempfile::tempdir;

/// Strategy for record values, including empty ones.
fn values_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn appended_records_read_back_after_reopen(
        base_offset in 0u64..1_000_000,
        values in values_strategy(),
        reopen_at in 0usize..40,
    ) {
        let dir = tempdir().unwrap();
        let config = Config::new().max_store_bytes(1 << 20).max_index_bytes(1 << 12);
        let split = reopen_at.min(values.len());

        let segment = Segment::open(dir.path(), base_offset, config.clone()).unwrap();
        for (i, value) in values[..split].iter().enumerate() {
            let offset = segment.append(&mut Record::new(value.clone())).unwrap();
            prop_assert_eq!(offset, base_offset + i as u64);
        }
        segment.close().unwrap();

        let segment = Segment::open(dir.path(), base_offset, config).unwrap();
        prop_assert_eq!(segment.next_offset(), base_offset + split as u64);
        for value in &values[split..] {
            let before = segment.next_offset();
            let offset = segment.append(&mut Record::new(value.clone())).unwrap();
            prop_assert_eq!(offset, before);
            prop_assert_eq!(segment.next_offset(), before + 1);
        }

        for (i, value) in values.iter().enumerate() {
            let record = segment.read(base_offset + i as u64).unwrap();
            prop_assert_eq!(&record.value, value);
        }
        prop_assert!(segment.read(base_offset + values.len() as u64).unwrap_err().is_not_found());
    }
}
