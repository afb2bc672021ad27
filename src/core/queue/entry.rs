// src/core/queue/entry.rs

//! The units held by the command queues: `Outbound` work waiting to be written,
//! and `PendingEntry` slots waiting for a reply.

use crate::core::commands::{CommandResult, ExecResult, PendingCommand, Responder};
use crate::core::protocol::{RespFrame, RespValue};
use crate::core::{ClientError, Command};
use std::fmt;
use tracing::warn;

/// Identifies one physical connection. Incremented on every successful
/// (re)connect, so replies and events from a dropped socket can be told apart
/// from those of its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConnectionEpoch(pub u64);

impl ConnectionEpoch {
    pub fn next(self) -> Self {
        ConnectionEpoch(self.0 + 1)
    }
}

impl fmt::Display for ConnectionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A committed `MULTI`/`EXEC` block that has not been written yet.
#[derive(Debug)]
pub struct TransactionBatch {
    pub commands: Vec<PendingCommand>,
    pub seq: u64,
    responder: Responder<ExecResult>,
}

impl TransactionBatch {
    pub fn new(commands: Vec<PendingCommand>, responder: Responder<ExecResult>) -> Self {
        Self {
            commands,
            seq: 0,
            responder,
        }
    }

    /// Fails the aggregate future and every staged placeholder with the same error.
    pub fn reject(self, err: ClientError) {
        for cmd in self.commands {
            cmd.reject(err.clone());
        }
        self.responder.settle(Err(err));
    }

    /// Request frames in wire order: `MULTI`, the staged commands, `EXEC`.
    pub fn frames(&self) -> Vec<RespFrame> {
        let mut frames = Vec::with_capacity(self.commands.len() + 2);
        frames.push(Command::multi().to_frame());
        frames.extend(self.commands.iter().map(|c| c.command.to_frame()));
        frames.push(Command::exec().to_frame());
        frames
    }
}

/// Work accepted by the client but not yet written to any live connection.
#[derive(Debug)]
pub enum Outbound {
    Single(PendingCommand),
    Transaction(TransactionBatch),
}

impl Outbound {
    pub fn seq(&self) -> u64 {
        match self {
            Outbound::Single(cmd) => cmd.seq,
            Outbound::Transaction(batch) => batch.seq,
        }
    }

    pub fn reject(self, err: ClientError) {
        match self {
            Outbound::Single(cmd) => cmd.reject(err),
            Outbound::Transaction(batch) => batch.reject(err),
        }
    }
}

/// A transaction whose bytes are on the wire.
#[derive(Debug)]
pub struct InFlightTransaction {
    batch: TransactionBatch,
    /// Acknowledgements still expected before the `EXEC` reply: one for `MULTI`
    /// and one per staged command.
    acks_remaining: usize,
    /// Error replies received in place of a `+QUEUED`, indexed by staged command.
    queue_errors: Vec<Option<String>>,
}

impl InFlightTransaction {
    pub fn new(batch: TransactionBatch) -> Self {
        let staged = batch.commands.len();
        Self {
            batch,
            acks_remaining: staged + 1,
            queue_errors: vec![None; staged],
        }
    }

    pub fn awaiting_ack(&self) -> bool {
        self.acks_remaining > 0
    }

    /// Swallows one queueing acknowledgement. Nothing is delivered to callers.
    pub fn record_ack(&mut self, frame: RespFrame) {
        let staged = self.queue_errors.len();
        // Index of the acknowledged request: 0 is MULTI, 1..=n the staged commands.
        let position = staged + 1 - self.acks_remaining;
        self.acks_remaining -= 1;
        match frame {
            RespFrame::Error(msg) if position > 0 => self.queue_errors[position - 1] = Some(msg),
            RespFrame::Error(msg) => warn!("MULTI was refused: {msg}"),
            ack if position == 0 && ack.is_ok() => {}
            ack if position > 0 && ack.is_queued_ack() => {}
            other => warn!(
                "Unexpected acknowledgement at position {position} of a transaction: {other:?}"
            ),
        }
    }

    /// Settles the block from the `EXEC` reply. When the server aborts the
    /// block, the staged placeholders are rejected along with the aggregate.
    pub fn complete(self, frame: RespFrame) {
        let InFlightTransaction {
            batch,
            queue_errors,
            ..
        } = self;
        match frame {
            RespFrame::Array(items) if items.len() == batch.commands.len() => {
                let mut results: Vec<CommandResult> = Vec::with_capacity(items.len());
                for (cmd, item) in batch.commands.into_iter().zip(items) {
                    let result = RespValue::from_reply(item);
                    cmd.settle(result.clone());
                    results.push(result);
                }
                batch.responder.settle(Ok(results));
            }
            RespFrame::Array(items) => {
                let err = ClientError::ProtocolIntegrity(format!(
                    "EXEC returned {} results for {} queued commands",
                    items.len(),
                    batch.commands.len()
                ));
                batch.reject(err);
            }
            RespFrame::NullArray | RespFrame::Null => batch.reject(ClientError::TransactionAborted),
            RespFrame::Error(msg) => {
                let err = match msg.strip_prefix("EXECABORT") {
                    Some(rest) => ClientError::ExecAborted(rest.trim().to_string()),
                    None => ClientError::Reply(msg),
                };
                let TransactionBatch {
                    commands,
                    responder,
                    ..
                } = batch;
                for (cmd, queue_error) in commands.into_iter().zip(queue_errors) {
                    match queue_error {
                        Some(own) => cmd.reject(ClientError::Reply(own)),
                        None => cmd.reject(err.clone()),
                    }
                }
                responder.settle(Err(err));
            }
            other => batch.reject(ClientError::ProtocolIntegrity(format!(
                "unexpected EXEC reply: {other:?}"
            ))),
        }
    }

    pub fn reject(self, err: ClientError) {
        self.batch.reject(err);
    }

    /// Returns the unsent form of the block, discarding any acknowledgements seen.
    pub fn into_batch(self) -> TransactionBatch {
        self.batch
    }

    pub fn len(&self) -> usize {
        self.batch.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.commands.is_empty()
    }
}

/// One slot in the reply FIFO: a single command or an entire transaction.
#[derive(Debug)]
pub enum PendingEntry {
    Single {
        command: PendingCommand,
        epoch: ConnectionEpoch,
    },
    Transaction {
        transaction: InFlightTransaction,
        epoch: ConnectionEpoch,
    },
}

impl PendingEntry {
    pub fn single(command: PendingCommand, epoch: ConnectionEpoch) -> Self {
        PendingEntry::Single { command, epoch }
    }

    pub fn transaction(batch: TransactionBatch, epoch: ConnectionEpoch) -> Self {
        PendingEntry::Transaction {
            transaction: InFlightTransaction::new(batch),
            epoch,
        }
    }

    pub fn epoch(&self) -> ConnectionEpoch {
        match self {
            PendingEntry::Single { epoch, .. } | PendingEntry::Transaction { epoch, .. } => *epoch,
        }
    }

    /// Converts the slot back into unsent work.
    pub fn into_outbound(self) -> Outbound {
        match self {
            PendingEntry::Single { command, .. } => Outbound::Single(command),
            PendingEntry::Transaction { transaction, .. } => {
                Outbound::Transaction(transaction.into_batch())
            }
        }
    }

    pub fn reject(self, err: ClientError) {
        match self {
            PendingEntry::Single { command, .. } => command.reject(err),
            PendingEntry::Transaction { transaction, .. } => transaction.reject(err),
        }
    }
}
