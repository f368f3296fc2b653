//! Engine Module
//!
//! The key-value storage engine underneath every database.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Apply write batches atomically (one WAL record per batch)
//! - Point reads and merged prefix scans
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/apply/flush): serialized by `write_lock`
///   and ordered write_lock → WAL → memtable → storage
/// - **Reads** (get/scan): no write lock; MemTable and StorageManager
///   use internal RwLocks
///
/// A batch becomes visible key by key while it is applied to the memtable.
/// Callers needing an atomic view (transactions) serialize against writers
/// at a higher level.
pub struct Engine {
    config: Config,

    /// Directory of this database's files
    dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl Engine {
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create the engine for `config.database_dir()`
    ///
    /// On startup:
    /// 1. Create the database directory
    /// 2. Load existing SSTables
    /// 3. Replay the WAL, flush it to an SSTable, truncate it
    pub fn open(config: Config) -> Result<Self> {
        let dir = config.database_dir();
        let storage_dir = dir.join(Self::SSTABLE_DIR);
        let wal_path = dir.join(Self::WAL_FILENAME);
        fs::create_dir_all(&storage_dir)?;

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;
            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery"
                );
            }

            for entry in entries {
                Self::replay(&memtable, entry.operation);
            }

            // Recovered data must be durable in an SSTable before the WAL
            // is truncated below
            if !memtable.is_empty() {
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.truncate()?;

        tracing::debug!(dir = %dir.display(), sstables = storage.sstable_count(), "engine opened");

        Ok(Self {
            config,
            dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.memtable.get(key) {
            Some(MemTableEntry::Value(value)) => Ok(Some(value)),
            Some(MemTableEntry::Tombstone) => Ok(None),
            None => self.storage.get(key),
        }
    }

    /// All live key-value pairs whose key starts with `prefix`, in key order
    ///
    /// The memtable is read before the SSTables: a flush in between leaves
    /// its entries in both places, never in neither.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let recent = self.memtable.scan_prefix(prefix);
        let mut merged = self.storage.scan_prefix(prefix)?;
        for (key, entry) in recent {
            merged.insert(key, entry);
        }

        Ok(merged
            .into_iter()
            .filter_map(|(key, entry)| match entry {
                MemTableEntry::Value(value) => Some((key, value)),
                MemTableEntry::Tombstone => None,
            })
            .collect())
    }

    /// Put a single key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.apply(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Delete a single key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.apply(Operation::Delete { key: key.to_vec() })
    }

    /// Apply a batch of puts/deletes as one durable unit
    pub fn apply_batch(&self, operations: Vec<Operation>) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        self.apply(Operation::Batch { operations })
    }

    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append to WAL (durability)
    /// 3. Apply to MemTable
    /// 4. Flush if the memtable is over its limit
    ///
    /// The write is durable after step 2. A failed flush keeps the memtable
    /// (still covered by the WAL) and is retried on the next write.
    fn apply(&self, operation: Operation) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(operation.clone())?;
        Self::replay(&self.memtable, operation);

        if self.memtable.should_flush(self.config.memtable_size_limit) {
            if let Err(e) = self.flush_internal() {
                tracing::warn!(error = %e, "memtable flush failed, retrying on next write");
            }
        }

        Ok(())
    }

    /// Flush memtable to disk regardless of its size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Called with write lock held
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        // Entries are now durable in the SSTable
        self.wal.lock().truncate()?;

        Ok(())
    }

    fn replay(memtable: &MemTable, operation: Operation) {
        match operation {
            Operation::Put { key, value } => {
                memtable.put(key, value);
            }
            Operation::Delete { key } => {
                memtable.delete(key);
            }
            Operation::Batch { operations } => {
                for op in operations {
                    Self::replay(memtable, op);
                }
            }
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Directory holding this database's files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        self.storage.data_dir()
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
