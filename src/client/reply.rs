// src/client/reply.rs

//! Futures returned to callers.

use crate::core::commands::CommandResult;
use crate::core::{ClientError, RespValue};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves exactly once with the outcome of a submitted command.
///
/// The future is returned immediately on submission; awaiting it is the only
/// suspension point. If the client goes away without answering, it resolves
/// with `ClientError::ConnectionClosed`.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct ReplyFuture<T = RespValue> {
    rx: oneshot::Receiver<Result<T, ClientError>>,
}

/// Resolves with one result per staged command, in staging order.
pub type ExecFuture = ReplyFuture<Vec<CommandResult>>;

impl<T> ReplyFuture<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T, ClientError>>) -> Self {
        Self { rx }
    }

    /// A future that is already settled.
    pub(crate) fn ready(result: Result<T, ClientError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl<T> Future for ReplyFuture<T> {
    type Output = Result<T, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ClientError::ConnectionClosed(
                "client stopped before the command was answered".to_string(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}
