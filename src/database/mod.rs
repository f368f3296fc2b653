//! Database Module
//!
//! Owns the database handle: open, schema upgrade, readiness gating.
//!
//! ## Lifecycle
//! ```text
//!   Database::new()            open() called          open() finished
//!   ┌──────────┐              ┌─────────┐            ┌────────────────┐
//!   │ Unopened │ ───────────▶ │ Opening │ ─────────▶ │ Ready | Failed │
//!   └──────────┘              └─────────┘            └────────────────┘
//! ```
//! A `Database` is created once at startup and cloned into every caller.
//! Only `Ready` hands out a `Connection`; every other state answers
//! `NotReady`. A slot moves through the diagram once; there is no close.

mod connection;
mod upgrade;

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;

use crate::catalog::{self, Catalog};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, RosterError};

pub use connection::Connection;
pub(crate) use connection::Shared;
pub use upgrade::VersionChange;

/// Observable state of a `Database`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Unopened,
    Opening,
    Ready,
    Failed,
}

enum Slot {
    Unopened,
    Opening,
    Ready(Connection),
    Failed,
}

/// Process-scoped database handle
#[derive(Clone)]
pub struct Database {
    slot: Arc<RwLock<Slot>>,
}

impl Database {
    /// An unopened handle; operations answer `NotReady` until `open` succeeds
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot::Unopened)),
        }
    }

    /// Open (and if needed upgrade) the database described by `config`
    ///
    /// `upgrade` runs only when the database is new or `version` is higher
    /// than the stored version; it runs before success is signalled and its
    /// effects commit atomically with the new version.
    ///
    /// Completes at most once per handle. Failures are reported as
    /// `OpenFailure` and leave the handle permanently unusable.
    pub async fn open<F>(&self, config: Config, version: u32, upgrade: F) -> Result<Connection>
    where
        F: FnOnce(&mut VersionChange) -> Result<()> + Send + 'static,
    {
        {
            let mut slot = self.slot.write();
            if !matches!(*slot, Slot::Unopened) {
                return Err(RosterError::AlreadyOpened);
            }
            *slot = Slot::Opening;
        }

        let name = config.name.clone();
        tracing::debug!(database = %name, version, "opening database");

        let runtime = Handle::current();
        let result = tokio::task::spawn_blocking(move || {
            Self::open_blocking(config, version, upgrade, runtime)
        })
        .await
        .map_err(|e| RosterError::Storage(format!("open task failed: {}", e)))
        .and_then(|opened| opened);

        let mut slot = self.slot.write();
        match result {
            Ok(connection) => {
                tracing::info!(database = %name, version, "database open and ready");
                *slot = Slot::Ready(connection.clone());
                Ok(connection)
            }
            Err(e) => {
                tracing::error!(database = %name, error = %e, "failed to open database");
                *slot = Slot::Failed;
                Err(RosterError::open_failure(e))
            }
        }
    }

    /// The live connection, or `NotReady`
    pub fn connection(&self) -> Result<Connection> {
        match &*self.slot.read() {
            Slot::Ready(connection) => Ok(connection.clone()),
            _ => Err(RosterError::NotReady),
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        match &*self.slot.read() {
            Slot::Unopened => ReadyState::Unopened,
            Slot::Opening => ReadyState::Opening,
            Slot::Ready(_) => ReadyState::Ready,
            Slot::Failed => ReadyState::Failed,
        }
    }

    fn open_blocking<F>(config: Config, version: u32, upgrade: F, runtime: Handle) -> Result<Connection>
    where
        F: FnOnce(&mut VersionChange) -> Result<()>,
    {
        if version == 0 {
            return Err(RosterError::Config(
                "Schema version must be at least 1".to_string(),
            ));
        }

        let name = config.name.clone();
        let engine = Engine::open(config)?;
        let mut catalog = Catalog::load(&engine)?;

        if version < catalog.version {
            return Err(RosterError::VersionError {
                requested: version,
                stored: catalog.version,
            });
        }

        if version > catalog.version {
            let mut change =
                VersionChange::new(catalog.version, version, catalog.collections.keys().cloned());
            upgrade(&mut change)?;

            let created = change.into_created();
            engine.apply_batch(catalog::upgrade_operations(version, &created)?)?;

            tracing::info!(
                database = %name,
                from = catalog.version,
                to = version,
                created = created.len(),
                "schema upgraded"
            );
            for schema in created {
                catalog.collections.insert(schema.name.clone(), schema);
            }
            catalog.version = version;
        }

        Ok(Connection::new(name, engine, catalog, runtime))
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
