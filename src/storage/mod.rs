//! Storage Module
//!
//! Persistent storage layer using an SSTable format.
//!
//! ## Responsibilities
//! - Persist flushed memtables to disk in sorted order
//! - Point lookups and prefix scans across tables
//! - Crash-safe table creation (write to temp, then rename)

mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableReader};
pub use manager::StorageManager;
