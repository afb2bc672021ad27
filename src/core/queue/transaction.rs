// src/core/queue/transaction.rs

//! Client-side `MULTI`/`EXEC` staging.
//!
//! Commands staged between `begin` and `commit` are buffered locally and
//! written as one contiguous block at commit time, so nothing else the client
//! sends can land between `MULTI` and `EXEC` on the wire.

use super::entry::TransactionBatch;
use crate::core::commands::{Command, CommandResult, ExecResult, PendingCommand, Responder};
use crate::core::ClientError;
use tokio::sync::oneshot;

/// The buffered commands of one open transaction.
#[derive(Debug, Default)]
pub struct TransactionContext {
    commands: Vec<PendingCommand>,
}

impl TransactionContext {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Holds at most one open `TransactionContext`.
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    context: Option<TransactionContext>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.context.is_some()
    }

    /// Number of commands staged in the open transaction.
    pub fn staged(&self) -> usize {
        self.context.as_ref().map_or(0, TransactionContext::len)
    }

    /// Opens a transaction. Transactions do not nest.
    pub fn begin(&mut self) -> Result<(), ClientError> {
        if self.context.is_some() {
            return Err(ClientError::InvalidState(
                "MULTI calls can not be nested".to_string(),
            ));
        }
        self.context = Some(TransactionContext::default());
        Ok(())
    }

    /// Buffers a command and returns the receiver for its placeholder result,
    /// which settles only once the whole transaction does.
    pub fn stage(
        &mut self,
        command: Command,
    ) -> Result<oneshot::Receiver<CommandResult>, ClientError> {
        let context = self.context.as_mut().ok_or_else(|| {
            ClientError::InvalidState("command staged without MULTI".to_string())
        })?;
        if command.is_transaction_control() {
            return Err(ClientError::InvalidRequest(format!(
                "'{}' cannot be staged inside a transaction",
                command.name()
            )));
        }
        let (mut pending, rx) = PendingCommand::with_channel(command);
        pending.in_transaction = true;
        context.commands.push(pending);
        Ok(rx)
    }

    /// Closes the transaction and turns it into a single batch ready to be
    /// written, together with the receiver for its aggregate result.
    pub fn commit(&mut self) -> Result<(TransactionBatch, oneshot::Receiver<ExecResult>), ClientError> {
        let context = self
            .context
            .take()
            .ok_or_else(|| ClientError::InvalidState("EXEC without MULTI".to_string()))?;
        let (responder, rx) = Responder::channel();
        Ok((TransactionBatch::new(context.commands, responder), rx))
    }

    /// Drops the open transaction, rejecting every staged placeholder.
    /// Returns how many commands were discarded.
    pub fn discard(&mut self) -> Result<usize, ClientError> {
        let context = self
            .context
            .take()
            .ok_or_else(|| ClientError::InvalidState("DISCARD without MULTI".to_string()))?;
        let count = context.commands.len();
        for cmd in context.commands {
            cmd.reject(ClientError::InvalidState("transaction discarded".to_string()));
        }
        Ok(count)
    }
}
