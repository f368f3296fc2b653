//! Live database connection
//!
//! The handle every transaction is opened against.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;

use crate::catalog::{Catalog, CollectionSchema};
use crate::engine::Engine;
use crate::error::{Result, RosterError};
use crate::transaction::{Transaction, TransactionMode};

/// State shared by a connection and all of its transactions
///
/// Nothing in here changes after open except the locks' internal state.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) engine: Engine,
    pub(crate) catalog: Catalog,
    /// One lock per collection; readwrite transactions take it exclusively
    pub(crate) locks: BTreeMap<String, RwLock<()>>,
    /// Runtime whose blocking pool runs transaction workers
    pub(crate) runtime: Handle,
    next_transaction_id: AtomicU64,
}

impl Shared {
    pub(crate) fn next_transaction_id(&self) -> u64 {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// A live, opened database
///
/// Cheap to clone; all clones share one engine.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    pub(crate) fn new(name: String, engine: Engine, catalog: Catalog, runtime: Handle) -> Self {
        let locks = catalog
            .collections
            .keys()
            .map(|name| (name.clone(), RwLock::new(())))
            .collect();

        Self {
            shared: Arc::new(Shared {
                name,
                engine,
                catalog,
                locks,
                runtime,
                next_transaction_id: AtomicU64::new(1),
            }),
        }
    }

    /// Open a transaction over `collections` with the given mode
    ///
    /// Returns immediately; the transaction's locks are acquired by its
    /// worker before the first request runs.
    pub fn transaction(&self, collections: &[&str], mode: TransactionMode) -> Result<Transaction> {
        if collections.is_empty() {
            return Err(RosterError::Config(
                "A transaction needs at least one collection".to_string(),
            ));
        }

        let mut scope = Vec::with_capacity(collections.len());
        for name in collections {
            self.shared.catalog.get(name)?;
            scope.push(name.to_string());
        }
        // Sorted lock order keeps multi-collection transactions deadlock-free
        scope.sort();
        scope.dedup();

        Ok(Transaction::begin(Arc::clone(&self.shared), scope, mode))
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Schema version this connection was opened at
    pub fn version(&self) -> u32 {
        self.shared.catalog.version
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.shared.catalog.collections.keys().cloned().collect()
    }

    /// Schema of one collection
    pub fn collection(&self, name: &str) -> Result<&CollectionSchema> {
        self.shared.catalog.get(name)
    }

    /// Underlying engine (for inspection and tests)
    pub fn engine(&self) -> &Engine {
        &self.shared.engine
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.shared.name)
            .field("version", &self.shared.catalog.version)
            .field("collections", &self.collection_names())
            .finish()
    }
}
