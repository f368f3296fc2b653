//! Friends Module
//!
//! The `friends` collection and the four operations callers use on it.
//!
//! Every operation follows the same shape:
//! readiness check → transaction (declared mode) → collection handle →
//! one request → outcome reported through the returned future.
//!
//! The readiness check and transaction open happen before the future is
//! returned, so `NotReady` is reported synchronously and no transaction is
//! opened for it.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CollectionOptions;
use crate::database::{Connection, Database, VersionChange};
use crate::error::{Result, RosterError};
use crate::record::Record;
use crate::transaction::{Request, Transaction, TransactionMode};

/// Name of the collection
pub const FRIENDS: &str = "friends";

/// Database name used when none is configured
pub const DEFAULT_DATABASE_NAME: &str = "MyDatabase";

/// Schema version that introduces the `friends` collection
pub const SCHEMA_VERSION: u32 = 1;

/// One stored friend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    /// Assigned by the store on insert
    pub id: Option<u64>,
    pub name: String,
    pub age: u32,
    /// Set when the record is created
    pub added: DateTime<Utc>,
}

impl Friend {
    /// A new, not yet stored friend stamped with the current time
    pub fn new(name: impl Into<String>, age: u32) -> Self {
        Self {
            id: None,
            name: name.into(),
            age,
            added: Utc::now(),
        }
    }
}

impl Record for Friend {
    fn key(&self) -> Option<u64> {
        self.id
    }

    fn set_key(&mut self, key: u64) {
        self.id = Some(key);
    }
}

/// Upgrade step: create `friends` (key path `id`, auto-increment)
///
/// Skips creation when the collection already exists.
pub fn upgrade(change: &mut VersionChange) -> Result<()> {
    if change.contains_collection(FRIENDS) {
        return Ok(());
    }
    change.create_collection(FRIENDS, CollectionOptions::auto_increment("id"))?;
    tracing::info!(collection = FRIENDS, "collection created");
    Ok(())
}

/// Operations on the `friends` collection
#[derive(Clone)]
pub struct FriendStore {
    database: Database,
}

impl FriendStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Add a friend; resolves to the id the store assigned
    pub fn insert(
        &self,
        name: impl Into<String>,
        age: u32,
    ) -> Result<impl Future<Output = Result<u64>> + Send + 'static> {
        let name = name.into();
        let (tx, request) = self.begin("insert", TransactionMode::ReadWrite, |tx| {
            Ok(tx.object_store(FRIENDS)?.add(Friend::new(name.clone(), age)))
        })?;

        Ok(async move {
            let outcome = complete(request, tx).await;
            match &outcome {
                Ok(id) => tracing::info!(id, name = %name, "friend added"),
                Err(e) => tracing::error!(name = %name, error = %e, "failed to add friend"),
            }
            outcome.map_err(|e| RosterError::request_failure("insert", e))
        })
    }

    /// Every friend, in id order
    pub fn read_all(&self) -> Result<impl Future<Output = Result<Vec<Friend>>> + Send + 'static> {
        let (tx, request) = self.begin("read_all", TransactionMode::ReadOnly, |tx| {
            Ok(tx.object_store(FRIENDS)?.get_all::<Friend>())
        })?;

        Ok(async move {
            let outcome = complete(request, tx).await;
            match &outcome {
                Ok(friends) => {
                    tracing::info!(count = friends.len(), "all friends read");
                    for friend in friends {
                        tracing::debug!(id = ?friend.id, name = %friend.name, age = friend.age, "friend");
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to read friends"),
            }
            outcome.map_err(|e| RosterError::request_failure("read_all", e))
        })
    }

    /// One friend by id; `None` when no such friend exists
    pub fn read_by_key(
        &self,
        id: u64,
    ) -> Result<impl Future<Output = Result<Option<Friend>>> + Send + 'static> {
        let (tx, request) = self.begin("read_by_key", TransactionMode::ReadOnly, |tx| {
            Ok(tx.object_store(FRIENDS)?.get::<Friend>(id))
        })?;

        Ok(async move {
            let outcome = complete(request, tx).await;
            match &outcome {
                Ok(Some(friend)) => {
                    tracing::info!(id, name = %friend.name, age = friend.age, "friend found")
                }
                Ok(None) => tracing::info!(id, "friend not found"),
                Err(e) => tracing::error!(id, error = %e, "failed to read friend"),
            }
            outcome.map_err(|e| RosterError::request_failure("read_by_key", e))
        })
    }

    /// Delete a friend, then read the remaining list
    ///
    /// Deleting an id that does not exist succeeds. The refresh runs in its
    /// own transaction and may observe writes made in between.
    pub fn delete(&self, id: u64) -> Result<impl Future<Output = Result<Vec<Friend>>> + Send + 'static> {
        let (tx, request) = self.begin("delete", TransactionMode::ReadWrite, |tx| {
            Ok(tx.object_store(FRIENDS)?.delete(id))
        })?;
        let this = self.clone();

        Ok(async move {
            match complete(request, tx).await {
                Ok(()) => tracing::info!(id, "friend deleted"),
                Err(e) => {
                    tracing::error!(id, error = %e, "failed to delete friend");
                    return Err(RosterError::request_failure("delete", e));
                }
            }
            this.read_all()?.await
        })
    }

    /// Readiness check, transaction open and request issue
    fn begin<T>(
        &self,
        operation: &'static str,
        mode: TransactionMode,
        issue: impl FnOnce(&Transaction) -> Result<Request<T>>,
    ) -> Result<(Transaction, Request<T>)> {
        let connection = self.connection()?;
        let open = || -> Result<(Transaction, Request<T>)> {
            let tx = connection.transaction(&[FRIENDS], mode)?;
            let request = issue(&tx)?;
            Ok((tx, request))
        };
        open().map_err(|e| RosterError::request_failure(operation, e))
    }

    fn connection(&self) -> Result<Connection> {
        self.database.connection().map_err(|e| {
            tracing::error!("database not ready");
            e
        })
    }
}

/// Wait for the request, then for the transaction to commit
async fn complete<T>(request: Request<T>, tx: Transaction) -> Result<T> {
    let value = request.await?;
    tx.done().await?;
    Ok(value)
}
