//! Request futures
//!
//! One request = one unit of work inside a transaction, resolving once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Result, RosterError};

/// Pending result of a single request
///
/// Resolves exactly once. If the transaction's worker went away without
/// answering, resolves to `TransactionAborted`.
#[must_use = "a request reports its outcome only when awaited"]
#[derive(Debug)]
pub struct Request<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Request<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T>>) -> Self {
        Self { rx }
    }
}

impl<T> Future for Request<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(RosterError::TransactionAborted)))
    }
}
