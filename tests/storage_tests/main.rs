//! Storage layer tests: SSTable files and the manager over them

mod sstable_tests;

use rosterdb::memtable::MemTable;

/// Build a memtable from `(key, Some(value) | None)` pairs
fn memtable_of(entries: &[(&str, Option<&str>)]) -> MemTable {
    let memtable = MemTable::new();
    for (key, value) in entries {
        match value {
            Some(v) => memtable.put(key.as_bytes().to_vec(), v.as_bytes().to_vec()),
            None => memtable.delete(key.as_bytes().to_vec()),
        };
    }
    memtable
}
