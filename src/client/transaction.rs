// src/client/transaction.rs

//! The `Transaction` handle returned by `Client::multi`.

use super::reply::{ExecFuture, ReplyFuture};
use super::Client;
use crate::core::queue::TransactionBuilder;
use crate::core::{ClientError, Command};
use tracing::debug;

/// Stages commands for one `MULTI`/`EXEC` block.
///
/// ```no_run
/// # async fn demo(client: spineldb_client::Client) -> Result<(), spineldb_client::ClientError> {
/// let results = client.multi()?.ping(Some("a")).ping(Some("b")).exec().await?;
/// # Ok(())
/// # }
/// ```
///
/// Nothing is written until `exec`. Dropping the handle without executing it
/// discards the staged commands. The client accepts a new `multi` once this
/// handle is gone.
pub struct Transaction {
    client: Client,
    builder: TransactionBuilder,
}

impl Transaction {
    pub(crate) fn begin(client: Client) -> Result<Self, ClientError> {
        if !client.claim_transaction() {
            return Err(ClientError::InvalidState(
                "MULTI calls can not be nested".to_string(),
            ));
        }
        let mut transaction = Self {
            client,
            builder: TransactionBuilder::new(),
        };
        transaction.builder.begin()?;
        Ok(transaction)
    }

    /// Stages a command and returns its placeholder future. The placeholder
    /// resolves with this command's own result only when the whole transaction
    /// settles.
    pub fn queue(&mut self, command: Command) -> ReplyFuture {
        match self.builder.stage(command) {
            Ok(rx) => ReplyFuture::new(rx),
            Err(e) => ReplyFuture::ready(Err(e)),
        }
    }

    /// Stages a command, builder style. Its individual result is available
    /// from the `exec` output.
    pub fn add(mut self, command: Command) -> Self {
        let _placeholder = self.queue(command);
        self
    }

    pub fn ping(self, message: Option<&str>) -> Self {
        self.add(Command::ping(message))
    }

    pub fn get(self, key: impl Into<bytes::Bytes>) -> Self {
        self.add(Command::get(key))
    }

    pub fn set(self, key: impl Into<bytes::Bytes>, value: impl Into<bytes::Bytes>) -> Self {
        self.add(Command::set(key, value))
    }

    /// Number of commands staged so far.
    pub fn len(&self) -> usize {
        self.builder.staged()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commits the transaction. The returned future resolves with one result
    /// per staged command, in staging order, or rejects if the server aborted
    /// the transaction or the connection was lost while it was in flight.
    pub fn exec(mut self) -> ExecFuture {
        let (batch, rx) = match self.builder.commit() {
            Ok(committed) => committed,
            Err(e) => return ReplyFuture::ready(Err(e)),
        };
        if batch.commands.is_empty() {
            // An empty block has nothing to ask the server.
            return ReplyFuture::ready(Ok(Vec::new()));
        }
        self.client.submit_transaction(batch);
        ReplyFuture::new(rx)
    }

    /// Abandons the transaction without sending anything. Staged placeholders
    /// reject. Returns how many commands were discarded.
    pub fn discard(mut self) -> usize {
        self.builder.discard().unwrap_or(0)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.builder.is_open()
            && let Ok(count) = self.builder.discard()
            && count > 0
        {
            debug!("Transaction dropped without EXEC; discarded {count} staged commands.");
        }
        self.client.release_transaction();
    }
}
