//! # RosterDB
//!
//! An embedded, versioned object store holding a small roster of friends:
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with partial write handling
//! - Named collections created by versioned schema upgrades
//! - Scoped read-only / read-write transactions with async requests
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 FriendStore operations                       │
//! │      insert · read_all · read_by_key · delete                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │          Database (readiness) → Connection                   │
//! │      Transactions: one worker each, requests in order        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  atomic batch per commit
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

pub mod catalog;
pub mod record;
pub mod database;
pub mod transaction;
pub mod friends;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, RosterError};
pub use config::Config;
pub use engine::Engine;

pub use catalog::CollectionOptions;
pub use record::Record;
pub use database::{Connection, Database, ReadyState, VersionChange};
pub use transaction::{ObjectStore, Request, Transaction, TransactionMode};
pub use friends::{Friend, FriendStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of RosterDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
