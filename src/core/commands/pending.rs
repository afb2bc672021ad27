// src/core/commands/pending.rs

//! A submitted command together with the channel its caller is waiting on.

use super::Command;
use crate::core::{ClientError, RespValue};
use tokio::sync::oneshot;

/// The result a single command settles with.
pub type CommandResult = Result<RespValue, ClientError>;

/// The aggregate result of a committed transaction: one entry per staged
/// command, in staging order.
pub type ExecResult = Result<Vec<CommandResult>, ClientError>;

/// The sending half of a caller's future.
///
/// `settle` consumes the responder, so a future can be settled at most once.
/// A responder dropped without settling resolves its future with
/// `ClientError::ConnectionClosed` on the receiving side.
#[derive(Debug)]
pub struct Responder<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Responder<T> {
    pub fn channel() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Delivers the outcome. A caller that stopped waiting is not an error.
    pub fn settle(self, value: T) {
        let _ = self.tx.send(value);
    }
}

/// A command accepted by the client and not yet settled.
#[derive(Debug)]
pub struct PendingCommand {
    pub command: Command,
    /// Submission order as observed by the connection controller.
    pub seq: u64,
    /// Set for commands staged inside `MULTI`; their replies are only
    /// delivered through the transaction's aggregate result.
    pub in_transaction: bool,
    responder: Responder<CommandResult>,
}

impl PendingCommand {
    pub fn new(command: Command, responder: Responder<CommandResult>) -> Self {
        Self {
            command,
            seq: 0,
            in_transaction: false,
            responder,
        }
    }

    /// Creates a command with a fresh channel, returning the receiving half too.
    pub fn with_channel(command: Command) -> (Self, oneshot::Receiver<CommandResult>) {
        let (responder, rx) = Responder::channel();
        (Self::new(command, responder), rx)
    }

    pub fn resolve(self, value: RespValue) {
        self.responder.settle(Ok(value));
    }

    pub fn reject(self, err: ClientError) {
        self.responder.settle(Err(err));
    }

    pub fn settle(self, result: CommandResult) {
        self.responder.settle(result);
    }
}
