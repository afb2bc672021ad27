// src/core/queue/reply_matcher.rs

//! The FIFO pairing of commands on the wire with the callers awaiting them.
//!
//! The protocol carries no correlation id, so position is identity: the
//! oldest entry is always the one the next reply answers. Entries are only
//! ever appended at the tail and removed from the head.

use super::entry::{ConnectionEpoch, PendingEntry};
use crate::core::protocol::{RespFrame, RespValue};
use crate::core::ClientError;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ReplyMatcher {
    entries: VecDeque<PendingEntry>,
    /// Cleared by the connection controller while no writable connection exists.
    accepting: bool,
}

impl ReplyMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `enqueue` again. Called when a connection becomes ready.
    pub fn open(&mut self) {
        self.accepting = true;
    }

    /// Refuses further `enqueue` calls until `open` is called.
    pub fn seal(&mut self) {
        self.accepting = false;
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Appends an entry whose bytes have just been written.
    ///
    /// Fails when no writable connection exists; the entry is handed back so the
    /// caller can route it elsewhere.
    pub fn enqueue(&mut self, entry: PendingEntry) -> Result<(), PendingEntry> {
        if !self.accepting {
            return Err(entry);
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Routes one reply read from connection `epoch` to the head entry.
    ///
    /// Queueing acknowledgements inside a transaction are swallowed without
    /// popping; only the `EXEC` reply settles the block. A head written on a
    /// different connection is never answered; the entry stays in place.
    pub fn on_reply(&mut self, epoch: ConnectionEpoch, frame: RespFrame) -> Result<(), ClientError> {
        let Some(head) = self.entries.front_mut() else {
            return Err(ClientError::ProtocolIntegrity(format!(
                "received reply with no command pending: {frame:?}"
            )));
        };
        if head.epoch() != epoch {
            return Err(ClientError::ProtocolIntegrity(format!(
                "reply from connection {epoch} but the oldest command was written on {}",
                head.epoch()
            )));
        }

        if let PendingEntry::Transaction { transaction, .. } = head
            && transaction.awaiting_ack()
        {
            transaction.record_ack(frame);
            return Ok(());
        }

        match self.entries.pop_front() {
            Some(PendingEntry::Single { command, .. }) => {
                command.settle(RespValue::from_reply(frame));
            }
            Some(PendingEntry::Transaction { transaction, .. }) => {
                debug!("EXEC reply settles transaction of {} commands", transaction.len());
                transaction.complete(frame);
            }
            None => {}
        }
        Ok(())
    }

    /// Rejects every outstanding entry, oldest first. Returns how many were rejected.
    pub fn on_fatal_disconnect(&mut self, err: ClientError) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            entry.reject(err.clone());
        }
        count
    }

    /// Removes every outstanding entry in FIFO order without settling any of
    /// them, for the caller to resend or reject.
    pub fn take_all(&mut self) -> Vec<PendingEntry> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
