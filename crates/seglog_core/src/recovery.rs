//! Open-time reconciliation of a segment's store and index.
//!
//! After a clean close the two files agree. After a crash, or an append
//! whose index write failed, they may not:
//!
//! - the index (mapped, so written straight to the page cache) can hold
//!   entries whose store bytes were still buffered and never reached disk;
//! - the store can hold complete records past the last indexed one, or a
//!   torn record at its tail.
//!
//! The index is authoritative for what the segment holds. Entries without
//! a complete, matching store record are dropped. Store records past the
//! last entry are indexed while they decode to the expected next offset and
//! the index has room. Valid records the index has no room for stay in the
//! store untouched; only the first torn or mismatched record and what
//! follows it are cut.
//!
//! Planning only reads, so the same pass can report on a segment without
//! repairing it.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use seglog_storage::{
    encoding, scan_used_size, Index, StorageError, StorageResult, Store, ENTRY_WIDTH, LEN_WIDTH,
};
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

/// What reconciliation changed, or would change, in a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Index entries dropped because their record was missing or torn.
    pub dropped_entries: u64,
    /// Store records that were missing from the index and got indexed.
    pub reindexed: u64,
    /// Bytes cut from the end of the store.
    pub truncated_bytes: u64,
    /// Complete store records kept but left unindexed, because the index
    /// is full or their offsets no longer fit it.
    pub unindexed_records: u64,
}

impl RecoveryReport {
    /// Returns true if reconciliation modifies the store or the index.
    #[must_use]
    pub fn needs_repair(&self) -> bool {
        self.dropped_entries > 0 || self.reindexed > 0 || self.truncated_bytes > 0
    }

    /// Returns true if the store and index already agree.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Changes that bring a store and an index back into agreement.
#[derive(Debug, Default)]
pub(crate) struct RecoveryPlan {
    /// Index entries to keep; the rest are dropped.
    kept_entries: u64,
    /// Store positions to append to the index, in order.
    reindex: Vec<u64>,
    /// Store size to cut back to, if the store ends in a bad record.
    truncate_to: Option<u64>,
    report: RecoveryReport,
}

impl RecoveryPlan {
    pub(crate) fn report(&self) -> RecoveryReport {
        self.report
    }
}

/// Index entries as seen by the planner.
pub(crate) trait EntrySource {
    /// Number of well-formed entries.
    fn entries(&self) -> u64;
    /// Entry number `slot`, as `(relative_offset, position)`.
    fn entry(&self, slot: u64) -> StorageResult<(u32, u64)>;
    /// Number of entries the index can hold in total.
    fn capacity_entries(&self) -> u64;
}

impl EntrySource for Index {
    fn entries(&self) -> u64 {
        Index::entries(self)
    }

    fn entry(&self, slot: u64) -> StorageResult<(u32, u64)> {
        self.read(i64::try_from(slot).unwrap_or(i64::MAX))
    }

    fn capacity_entries(&self) -> u64 {
        self.capacity() / ENTRY_WIDTH
    }
}

/// Index entries read from a file without mapping or resizing it.
#[derive(Debug)]
pub(crate) struct IndexSnapshot {
    bytes: Vec<u8>,
    used: u64,
    capacity: u64,
}

impl IndexSnapshot {
    /// Reads the index file at `path`. A missing file is an empty index.
    pub(crate) fn read(path: &Path, max_index_bytes: u64) -> CoreResult<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let used = scan_used_size(&bytes)?;
        let capacity = (bytes.len() as u64).max(max_index_bytes);

        Ok(Self {
            bytes,
            used,
            capacity,
        })
    }
}

impl EntrySource for IndexSnapshot {
    fn entries(&self) -> u64 {
        self.used / ENTRY_WIDTH
    }

    fn entry(&self, slot: u64) -> StorageResult<(u32, u64)> {
        let entries = self.entries();
        if slot >= entries {
            return Err(StorageError::EntryNotFound {
                entry: i64::try_from(slot).unwrap_or(i64::MAX),
                entries,
            });
        }
        let start = (slot * ENTRY_WIDTH) as usize;
        encoding::decode_entry(&self.bytes[start..])
    }

    fn capacity_entries(&self) -> u64 {
        self.capacity / ENTRY_WIDTH
    }
}

/// Works out how to reconcile `store` with `entries` without touching
/// either.
pub(crate) fn plan(
    store: &Store,
    entries: &impl EntrySource,
    base_offset: u64,
) -> CoreResult<RecoveryPlan> {
    let mut plan = RecoveryPlan {
        kept_entries: entries.entries(),
        ..RecoveryPlan::default()
    };

    let mut indexed_end = 0;
    while plan.kept_entries > 0 {
        let (relative_offset, position) = entries.entry(plan.kept_entries - 1)?;
        let expected = offset_at(base_offset, u64::from(relative_offset))?;

        if let Some(end) = record_end(store, position, expected)? {
            indexed_end = end;
            break;
        }
        plan.kept_entries -= 1;
    }
    plan.report.dropped_entries = entries.entries() - plan.kept_entries;

    let capacity = entries.capacity_entries().min(u64::from(u32::MAX) + 1);
    let mut slot = plan.kept_entries;
    let mut position = indexed_end;
    let size = store.size();

    while position < size {
        let Some(expected) = base_offset.checked_add(slot + plan.report.unindexed_records)
        else {
            break;
        };
        let Some(end) = record_end(store, position, expected)? else {
            plan.truncate_to = Some(position);
            plan.report.truncated_bytes = size - position;
            break;
        };

        if slot < capacity && plan.report.unindexed_records == 0 {
            plan.reindex.push(position);
            slot += 1;
        } else {
            plan.report.unindexed_records += 1;
        }
        position = end;
    }
    plan.report.reindexed = plan.reindex.len() as u64;

    Ok(plan)
}

/// Applies `plan` to the open `store` and `index`.
pub(crate) fn apply(plan: &RecoveryPlan, store: &Store, index: &Index) -> CoreResult<()> {
    if plan.kept_entries < index.entries() {
        index.truncate_entries(plan.kept_entries)?;
    }

    for (slot, &position) in (plan.kept_entries..).zip(&plan.reindex) {
        let relative_offset = u32::try_from(slot).map_err(|_| {
            CoreError::invalid_operation(format!("cannot index relative offset {slot}"))
        })?;
        index.write(relative_offset, position)?;
    }

    if let Some(size) = plan.truncate_to {
        store.truncate(size)?;
    }

    Ok(())
}

/// Brings `store` and `index` back into agreement.
pub(crate) fn reconcile(store: &Store, index: &Index, base_offset: u64) -> CoreResult<RecoveryReport> {
    let plan = plan(store, index, base_offset)?;
    apply(&plan, store, index)?;

    let report = plan.report();
    if !report.is_clean() {
        warn!(
            base_offset,
            dropped_entries = report.dropped_entries,
            reindexed = report.reindexed,
            truncated_bytes = report.truncated_bytes,
            unindexed_records = report.unindexed_records,
            "recovered segment"
        );
    }

    Ok(report)
}

/// Returns `base_offset + relative`, or an error if it does not fit.
pub(crate) fn offset_at(base_offset: u64, relative: u64) -> CoreResult<u64> {
    base_offset.checked_add(relative).ok_or_else(|| {
        CoreError::invalid_operation(format!(
            "offset {relative} past base {base_offset} overflows u64"
        ))
    })
}

/// Returns where the record at `position` ends, if it is complete and
/// carries `expected_offset`.
fn record_end(store: &Store, position: u64, expected_offset: u64) -> CoreResult<Option<u64>> {
    let bytes = match store.read(position) {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match Record::decode(&bytes) {
        Ok(record) if record.offset == expected_offset => {
            Ok(Some(position + LEN_WIDTH + bytes.len() as u64))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglog_storage::LAST_ENTRY;
    use std::path::Path;
    use tempfile::tempdir;

    const MAX: u64 = 4 * ENTRY_WIDTH;

    fn open(dir: &Path) -> (Store, Index) {
        let store = Store::open(&dir.join("0.store")).unwrap();
        let index = Index::open(&dir.join("0.index"), MAX).unwrap();
        (store, index)
    }

    fn append(store: &Store, offset: u64, value: &[u8]) -> u64 {
        let record = Record {
            value: value.to_vec(),
            offset,
        };
        store.append(&record.encode()).unwrap().1
    }

    #[test]
    fn consistent_files_are_untouched() {
        let dir = tempdir().unwrap();
        let (store, index) = open(dir.path());

        for i in 0..2u32 {
            let position = append(&store, u64::from(i), b"v");
            index.write(i, position).unwrap();
        }

        let report = reconcile(&store, &index, 0).unwrap();
        assert!(report.is_clean());
        assert!(!report.needs_repair());
        assert_eq!(index.entries(), 2);
    }

    #[test]
    fn empty_preallocated_index_is_emptied() {
        let dir = tempdir().unwrap();
        let (store, index) = open(dir.path());
        index.close().unwrap();

        // Simulate an index never closed: preallocated zeroes on disk.
        std::fs::OpenOptions::new()
            .write(true)
            .open(dir.path().join("0.index"))
            .unwrap()
            .set_len(MAX)
            .unwrap();

        let index = Index::open(&dir.path().join("0.index"), MAX).unwrap();
        // A zeroed first slot looks like a real entry until checked against the store.
        assert_eq!(index.entries(), 1);

        let report = reconcile(&store, &index, 0).unwrap();
        assert_eq!(report.dropped_entries, 1);
        assert_eq!(index.entries(), 0);
    }

    #[test]
    fn entries_past_store_end_are_dropped() {
        let dir = tempdir().unwrap();
        let (store, index) = open(dir.path());

        let position = append(&store, 0, b"kept");
        index.write(0, position).unwrap();
        index.write(1, 4096).unwrap();

        let report = reconcile(&store, &index, 0).unwrap();
        assert_eq!(report.dropped_entries, 1);
        assert_eq!(index.read(LAST_ENTRY).unwrap(), (0, 0));
    }

    #[test]
    fn unindexed_records_are_reindexed() {
        let dir = tempdir().unwrap();
        let (store, index) = open(dir.path());

        let first = append(&store, 5, b"a");
        index.write(0, first).unwrap();
        let second = append(&store, 6, b"b");

        let report = reconcile(&store, &index, 5).unwrap();
        assert_eq!(report.reindexed, 1);
        assert_eq!(report.truncated_bytes, 0);
        assert_eq!(index.read(1).unwrap(), (1, second));
    }

    #[test]
    fn torn_and_mismatched_tails_are_truncated() {
        let dir = tempdir().unwrap();
        let (store, index) = open(dir.path());

        let position = append(&store, 0, b"good");
        index.write(0, position).unwrap();
        let good_end = store.size();

        // Wrong offset for slot 1.
        append(&store, 9, b"stray");
        store.close().unwrap();

        // Torn frame: length says 50, 3 bytes follow.
        let mut torn = 50u64.to_be_bytes().to_vec();
        torn.extend_from_slice(b"abc");
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join("0.store"))
            .unwrap();
        std::io::Write::write_all(&mut file, &torn).unwrap();
        drop(file);

        let store = Store::open(&dir.path().join("0.store")).unwrap();
        let size = store.size();
        let report = reconcile(&store, &index, 0).unwrap();
        assert_eq!(report.reindexed, 0);
        assert_eq!(report.truncated_bytes, size - good_end);
        assert_eq!(store.size(), good_end);
        assert_eq!(index.entries(), 1);
    }

    #[test]
    fn records_beyond_index_capacity_are_kept() {
        let dir = tempdir().unwrap();
        let (store, index) = open(dir.path());

        for offset in 0..6u64 {
            append(&store, offset, b"r");
        }
        let size = store.size();

        let report = reconcile(&store, &index, 0).unwrap();
        assert_eq!(report.reindexed, 4);
        assert_eq!(report.unindexed_records, 2);
        assert_eq!(report.truncated_bytes, 0);
        assert!(index.is_full());
        assert_eq!(store.size(), size);
    }

    #[test]
    fn torn_tail_after_unindexed_records_is_truncated() {
        let dir = tempdir().unwrap();
        let (store, index) = open(dir.path());

        for offset in 0..6u64 {
            append(&store, offset, b"r");
        }
        let valid_end = store.size();
        append(&store, 42, b"stray");

        let report = reconcile(&store, &index, 0).unwrap();
        assert_eq!(report.unindexed_records, 2);
        assert_eq!(report.truncated_bytes, LEN_WIDTH + 8 + 5);
        assert_eq!(store.size(), valid_end);
    }

    #[test]
    fn plan_leaves_files_untouched() {
        let dir = tempdir().unwrap();
        let (store, index) = open(dir.path());

        append(&store, 0, b"a");
        index.write(0, 0).unwrap();
        index.write(1, 4096).unwrap();
        append(&store, 7, b"stray");
        let size = store.size();

        let plan = plan(&store, &index, 0).unwrap();
        let report = plan.report();
        assert!(report.needs_repair());
        assert_eq!(report.dropped_entries, 1);
        assert!(report.truncated_bytes > 0);

        assert_eq!(index.entries(), 2);
        assert_eq!(store.size(), size);
    }

    #[test]
    fn offsets_past_u64_max_are_rejected() {
        assert_eq!(offset_at(u64::MAX, 0).unwrap(), u64::MAX);
        assert!(matches!(
            offset_at(u64::MAX, 1),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn snapshot_matches_mapped_index() {
        let dir = tempdir().unwrap();
        let (store, index) = open(dir.path());

        for i in 0..3u32 {
            let position = append(&store, u64::from(i), b"s");
            index.write(i, position).unwrap();
        }
        index.flush().unwrap();
        append(&store, 3, b"unindexed");

        let snapshot = IndexSnapshot::read(&dir.path().join("0.index"), MAX).unwrap();
        assert_eq!(EntrySource::entries(&snapshot), 3);
        assert_eq!(snapshot.entry(2).unwrap(), index.read(2).unwrap());
        assert!(snapshot.entry(3).is_err());
        assert_eq!(snapshot.capacity_entries(), 4);

        let report = plan(&store, &snapshot, 0).unwrap().report();
        assert_eq!(report.reindexed, 1);
        assert!(report.needs_repair());

        let missing = IndexSnapshot::read(&dir.path().join("9.index"), MAX).unwrap();
        assert_eq!(EntrySource::entries(&missing), 0);
    }
}
