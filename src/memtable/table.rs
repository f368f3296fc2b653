//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::MemTableEntry;

/// In-memory table for recent writes
///
/// Size is the sum of key and value bytes; a tombstone counts its key only.
pub struct MemTable {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    data: BTreeMap<Vec<u8>, MemTableEntry>,
    size: usize,
}

impl Inner {
    /// Insert an entry, keeping the size accounting exact; returns new size
    fn upsert(&mut self, key: Vec<u8>, entry: MemTableEntry) -> usize {
        let key_len = key.len();
        let value_len = entry.value_len();
        match self.data.insert(key, entry) {
            // Key bytes were already counted
            Some(old) => self.size = self.size - old.value_len() + value_len,
            None => self.size += key_len + value_len,
        }
        self.size
    }
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Get an entry by key (read lock)
    ///
    /// A `Tombstone` means the key was deleted and older layers must not be
    /// consulted.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.inner.read().data.get(key).cloned()
    }

    /// Put a key-value pair (write lock); returns the new size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.inner.write().upsert(key, MemTableEntry::Value(value))
    }

    /// Delete a key (write lock, inserts tombstone); returns the new size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        self.inner.write().upsert(key, MemTableEntry::Tombstone)
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> Vec<(Vec<u8>, MemTableEntry)> {
        self.inner
            .read()
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Snapshot of the entries whose key starts with `prefix`
    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, MemTableEntry)> {
        self.inner
            .read()
            .data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.data.clear();
        inner.size = 0;
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
