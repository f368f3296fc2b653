//! Appends, LSN sequencing, sync strategies and truncation

use rosterdb::config::WalSyncStrategy;
use rosterdb::wal::{Operation, WalReader, WalWriter};

use super::{delete, put, setup_temp_wal};

// =============================================================================
// LSN Sequencing
// =============================================================================

#[test]
fn test_lsns_start_at_one_and_increase() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    let lsns: Vec<u64> = (0..50)
        .map(|i| writer.append(put(&format!("k{}", i), "v")).unwrap())
        .collect();

    assert_eq!(lsns, (1..=50).collect::<Vec<_>>());
    assert_eq!(writer.current_lsn(), 51);
}

#[test]
fn test_reopen_continues_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("a", "1")).unwrap();
        writer.append(put("b", "2")).unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.append(delete("a")).unwrap(), 3);
}

// =============================================================================
// Sync Strategies
// =============================================================================

#[test]
fn test_every_write_syncs_each_append() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(put("k1", "v1")).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_every_n_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();

    writer.append(put("k1", "v")).unwrap();
    writer.append(put("k2", "v")).unwrap();
    assert_eq!(writer.uncommitted_count(), 2);

    writer.append(put("k3", "v")).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);

    writer.append(put("k4", "v")).unwrap();
    writer.sync().unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

// =============================================================================
// Write + Read
// =============================================================================

#[test]
fn test_written_entries_read_back() {
    let (_temp, wal_path) = setup_temp_wal();
    let batch = Operation::Batch {
        operations: vec![put("friends/1", "Anna"), put("friends/2", "Ivan")],
    };
    {
        let mut writer =
            WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();
        writer.append(put("version", "1")).unwrap();
        writer.append(batch.clone()).unwrap();
        writer.append(delete("friends/1")).unwrap();
        writer.sync().unwrap();
    }

    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].operation, batch);
    assert!(matches!(entries[2].operation, Operation::Delete { .. }));
}

// =============================================================================
// Truncation
// =============================================================================

#[test]
fn test_truncate_empties_file_and_keeps_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("old", "1")).unwrap();
        writer.append(put("old", "2")).unwrap();
        writer.truncate().unwrap();

        assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 0);
        assert_eq!(writer.append(put("new", "3")).unwrap(), 3);
    }

    let mut reader = WalReader::open(&wal_path).unwrap();
    let only = reader.next_entry().unwrap().unwrap();
    assert_eq!(only.operation, put("new", "3"));
    assert!(reader.next_entry().unwrap().is_none());
}
