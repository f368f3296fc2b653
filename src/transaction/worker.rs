//! Transaction worker
//!
//! Each transaction runs on one blocking-pool thread which holds the
//! collection locks, executes queued requests in issuance order, and commits
//! the staged writes once the transaction is sealed (or its handle is gone).

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::database::Shared;
use crate::engine::Engine;
use crate::error::{Result, RosterError};
use crate::wal::Operation;

use super::TransactionMode;

/// Queued unit of work; answers its own request channel
pub(crate) type Job = Box<dyn FnOnce(&mut TxnState<'_>) + Send>;

pub(crate) enum Message {
    Run(Job),
    /// No more requests will follow
    Seal,
}

/// Per-transaction view: the engine plus writes staged so far
pub(crate) struct TxnState<'a> {
    engine: &'a Engine,
    mode: TransactionMode,
    /// key → new value; `None` stages a delete
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    aborted: bool,
}

impl<'a> TxnState<'a> {
    fn new(engine: &'a Engine, mode: TransactionMode) -> Self {
        Self {
            engine,
            mode,
            staged: BTreeMap::new(),
            aborted: false,
        }
    }

    /// Run one request; a failure aborts the transaction
    pub(crate) fn execute<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.aborted {
            return Err(RosterError::TransactionAborted);
        }

        let result = op(self);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "request failed, aborting transaction");
            self.aborted = true;
            self.staged.clear();
        }
        result
    }

    pub(crate) fn require_write(&self, collection: &str) -> Result<()> {
        match self.mode {
            TransactionMode::ReadWrite => Ok(()),
            TransactionMode::ReadOnly => Err(RosterError::ReadOnly(collection.to_string())),
        }
    }

    /// Read through staged writes to the engine
    pub(crate) fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.staged.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.engine.get(key),
        }
    }

    /// Live entries under `prefix`, staged writes applied, in key order
    pub(crate) fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = self
            .engine
            .scan_prefix(prefix)?
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();

        let staged = self
            .staged
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix));
        for (key, value) in staged {
            merged.insert(key.clone(), value.clone());
        }

        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }

    pub(crate) fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.staged.insert(key, Some(value));
    }

    pub(crate) fn delete(&mut self, key: Vec<u8>) {
        self.staged.insert(key, None);
    }

    /// Commit staged writes as one batch; returns how many were written
    fn commit(self) -> Result<usize> {
        if self.aborted {
            return Err(RosterError::TransactionAborted);
        }

        let operations: Vec<Operation> = self
            .staged
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => Operation::Put { key, value },
                None => Operation::Delete { key },
            })
            .collect();
        let written = operations.len();
        self.engine.apply_batch(operations)?;
        Ok(written)
    }
}

/// Worker body; runs on the blocking pool
pub(crate) fn run(
    shared: Arc<Shared>,
    id: u64,
    scope: Vec<String>,
    mode: TransactionMode,
    mut jobs: mpsc::UnboundedReceiver<Message>,
    done: oneshot::Sender<Result<()>>,
) {
    // Held until commit finishes; scope is sorted so lock order is global
    let mut shared_guards = Vec::new();
    let mut exclusive_guards = Vec::new();
    for lock in scope.iter().filter_map(|name| shared.locks.get(name)) {
        match mode {
            TransactionMode::ReadOnly => shared_guards.push(lock.read()),
            TransactionMode::ReadWrite => exclusive_guards.push(lock.write()),
        }
    }
    tracing::trace!(txn = id, %mode, ?scope, "transaction active");

    let mut state = TxnState::new(&shared.engine, mode);
    let mut requests = 0usize;
    while let Some(message) = jobs.blocking_recv() {
        match message {
            Message::Run(job) => {
                job(&mut state);
                requests += 1;
            }
            Message::Seal => break,
        }
    }
    drop(jobs);

    let outcome = state.commit();
    match &outcome {
        Ok(written) => {
            tracing::trace!(txn = id, requests, written, "transaction complete")
        }
        Err(e) => tracing::debug!(txn = id, requests, error = %e, "transaction aborted"),
    }

    drop(exclusive_guards);
    drop(shared_guards);
    // The caller may have dropped the transaction without waiting on it
    let _ = done.send(outcome.map(|_| ()));
}
