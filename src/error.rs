//! Error types for RosterDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RosterError
pub type Result<T> = std::result::Result<T, RosterError>;

/// Unified error type for RosterDB operations
#[derive(Debug, Error)]
pub enum RosterError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    /// An operation was invoked before the connection finished opening,
    /// or after opening failed.
    #[error("Database not ready")]
    NotReady,

    #[error("Database has already been opened on this handle")]
    AlreadyOpened,

    /// Opening or upgrading failed; the handle stays unusable
    #[error("Failed to open database: {source}")]
    OpenFailure {
        #[source]
        source: Box<RosterError>,
    },

    #[error("Requested version {requested} is lower than stored version {stored}")]
    VersionError { requested: u32, stored: u32 },

    // -------------------------------------------------------------------------
    // Schema / Transaction Errors
    // -------------------------------------------------------------------------
    #[error("Constraint violated: {0}")]
    ConstraintError(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Collection '{0}' is not writable in a read-only transaction")]
    ReadOnly(String),

    #[error("Transaction aborted")]
    TransactionAborted,

    /// The transaction already finished and takes no more requests
    #[error("Transaction is no longer active")]
    TransactionInactive,

    // -------------------------------------------------------------------------
    // Operation Errors
    // -------------------------------------------------------------------------
    #[error("{operation} request failed: {source}")]
    RequestFailure {
        operation: &'static str,
        #[source]
        source: Box<RosterError>,
    },
}

impl RosterError {
    /// Wrap an engine/transaction error as the failure of one operation
    pub fn request_failure(operation: &'static str, source: RosterError) -> Self {
        RosterError::RequestFailure {
            operation,
            source: Box::new(source),
        }
    }

    /// Wrap a failure that happened while opening (idempotent)
    pub fn open_failure(source: RosterError) -> Self {
        match source {
            e @ RosterError::OpenFailure { .. } => e,
            other => RosterError::OpenFailure {
                source: Box::new(other),
            },
        }
    }
}

impl From<bincode::Error> for RosterError {
    fn from(e: bincode::Error) -> Self {
        RosterError::Serialization(e.to_string())
    }
}
