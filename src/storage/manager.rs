//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup (and drop unfinished ones)
//! - Search SSTables newest → oldest for reads
//! - Merge SSTables for prefix scans
//! - Create new SSTables from MemTable flushes

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{Result, RosterError};
use crate::memtable::{MemTable, MemTableEntry};

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: RwLock; readers share it, flush takes it exclusively
/// - `next_sstable_id`: Atomic counter (lock-free)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if file_path.extension().and_then(|e| e.to_str()) == Some(SSTableBuilder::TMP_SUFFIX) {
                tracing::warn!(path = %file_path.display(), "removing unfinished SSTable");
                fs::remove_file(&file_path)?;
                continue;
            }
            if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            }
        }

        // Newest (highest ID) first
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let sstables = sstable_ids
            .iter()
            .map(|&id| SSTableReader::open(&Self::sstable_path_with_dir(path, id)))
            .collect::<Result<Vec<_>>>()?;

        let next_id = sstable_ids.first().map_or(1, |&id| id + 1);
        tracing::debug!(dir = %path.display(), count = sstables.len(), "storage opened");

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key not found, or found tombstone (deleted)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let sstables = self.sstables.read();

        for reader in sstables.iter().filter(|r| r.might_contain(key)) {
            match reader.get(key) {
                Ok(value) => return Ok(value),
                Err(RosterError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Merged view of every SSTable entry under `prefix`
    ///
    /// Newer tables shadow older ones; tombstones are kept (as `Tombstone`)
    /// so the caller can overlay the memtable before dropping them.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<BTreeMap<Vec<u8>, MemTableEntry>> {
        let sstables = self.sstables.read();
        let mut merged = BTreeMap::new();

        // Oldest first so newer entries overwrite
        for reader in sstables.iter().rev() {
            for (key, value) in reader.scan_prefix(prefix)? {
                let entry = value.map_or(MemTableEntry::Tombstone, MemTableEntry::Value);
                merged.insert(key, entry);
            }
        }

        Ok(merged)
    }

    /// Flush a MemTable to a new SSTable
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        let entries = memtable.iter();
        if entries.is_empty() {
            return Err(RosterError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(&path)?;
        for (key, entry) in &entries {
            match entry {
                MemTableEntry::Value(v) => builder.add(key, v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(key)?,
            }
        }
        let metadata = builder.finish()?;

        let reader = SSTableReader::open(&path)?;
        self.sstables.write().insert(0, reader);

        tracing::debug!(
            path = %metadata.path.display(),
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "memtable flushed"
        );

        Ok(metadata)
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()?.to_str()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        name.strip_prefix("sstable_")?.parse().ok()
    }
}
