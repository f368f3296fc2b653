//! Transaction Module
//!
//! Scoped units of work against one or more collections.
//!
//! ## Lifecycle
//! 1. `Connection::transaction(scope, mode)` returns at once and spawns a
//!    worker on the blocking pool
//! 2. The worker takes the collection locks: shared for `ReadOnly`,
//!    exclusive for `ReadWrite`
//! 3. Requests issued through `ObjectStore` handles run on the worker in
//!    issuance order; each resolves its own `Request` future
//! 4. Dropping the last open `ObjectStore` seals the transaction. Once the
//!    requests queued before the seal have run, staged writes commit as one
//!    WAL batch and the locks are released, whether or not the
//!    `Transaction` itself is still held
//!
//! A sealed transaction accepts no further requests: `object_store` fails
//! with `TransactionInactive`. A transaction that never opened a store
//! commits when it is dropped or `done()` is awaited.
//!
//! A failing request aborts the transaction: staged writes are discarded and
//! later requests resolve to `TransactionAborted`. There is no explicit
//! commit and no cancellation.

mod request;
mod store;
mod worker;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::database::Shared;
use crate::error::{Result, RosterError};

pub use request::Request;
pub use store::ObjectStore;

use worker::{Job, Message, TxnState};

/// Declared access mode of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only; may overlap other read-only transactions
    ReadOnly,
    /// Reads and writes; exclusive per collection
    ReadWrite,
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionMode::ReadOnly => f.write_str("readonly"),
            TransactionMode::ReadWrite => f.write_str("readwrite"),
        }
    }
}

/// A transaction over a fixed set of collections
pub struct Transaction {
    id: u64,
    mode: TransactionMode,
    scope: Vec<String>,
    shared: Arc<Shared>,
    jobs: mpsc::UnboundedSender<Message>,
    done: oneshot::Receiver<Result<()>>,
    window: Mutex<Window>,
}

/// Open `ObjectStore` handles; the transaction seals when the count returns to 0
#[derive(Default)]
struct Window {
    open: usize,
    sealed: bool,
}

impl Transaction {
    /// `scope` must be validated, sorted and deduplicated
    pub(crate) fn begin(shared: Arc<Shared>, scope: Vec<String>, mode: TransactionMode) -> Self {
        let id = shared.next_transaction_id();
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();

        let worker_shared = Arc::clone(&shared);
        let worker_scope = scope.clone();
        shared.runtime.spawn_blocking(move || {
            worker::run(worker_shared, id, worker_scope, mode, jobs_rx, done_tx)
        });

        tracing::trace!(txn = id, %mode, ?scope, "transaction opened");
        Self {
            id,
            mode,
            scope,
            shared,
            jobs: jobs_tx,
            done: done_rx,
            window: Mutex::new(Window::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Collections this transaction covers, sorted
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Handle to one collection in scope
    pub fn object_store(&self, name: &str) -> Result<ObjectStore<'_>> {
        if !self.scope.iter().any(|s| s == name) {
            return Err(RosterError::CollectionNotFound(format!(
                "{} (not in transaction scope)",
                name
            )));
        }
        let schema = self.shared.catalog.get(name)?.clone();

        let mut window = self.window.lock();
        if window.sealed {
            return Err(RosterError::TransactionInactive);
        }
        window.open += 1;
        Ok(ObjectStore::new(self, schema))
    }

    /// Called when an `ObjectStore` is dropped
    pub(crate) fn release_store(&self) {
        let mut window = self.window.lock();
        window.open = window.open.saturating_sub(1);
        if window.open == 0 && !window.sealed {
            window.sealed = true;
            // Queued behind every request issued so far
            let _ = self.jobs.send(Message::Seal);
            tracing::trace!(txn = self.id, "transaction sealed");
        }
    }

    /// Release this handle and wait for the commit (or abort)
    ///
    /// Requests already issued still resolve normally.
    pub async fn done(self) -> Result<()> {
        let Transaction { jobs, done, .. } = self;
        drop(jobs);
        done.await.unwrap_or_else(|_| Err(RosterError::TransactionAborted))
    }

    /// Queue `op` on the worker and hand back its request
    pub(crate) fn submit<T, F>(&self, op: F) -> Request<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut TxnState<'_>) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |state: &mut TxnState<'_>| {
            let _ = tx.send(state.execute(op));
        });
        // A vanished worker drops the job and its sender; the request then
        // resolves to TransactionAborted
        let _ = self.jobs.send(Message::Run(job));
        Request::new(rx)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("scope", &self.scope)
            .finish()
    }
}
