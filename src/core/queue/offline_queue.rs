// src/core/queue/offline_queue.rs

//! Holds work that has not been written to a live connection yet: commands
//! submitted before the first connect or during an outage, and commands
//! pulled back from the reply FIFO for retransmission after a reconnect.

use super::entry::Outbound;
use crate::core::ClientError;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct OfflineQueue {
    items: VecDeque<Outbound>,
    /// Maximum number of queued items accepted by `push`. `0` means unbounded.
    limit: usize,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: VecDeque::new(),
            limit,
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Appends freshly submitted work. When the queue is full the item is
    /// handed back untouched so the caller can reject it.
    pub fn push(&mut self, item: Outbound) -> Result<(), Outbound> {
        if self.limit > 0 && self.items.len() >= self.limit {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Places retransmissions ahead of everything already queued, keeping their
    /// relative order. Not subject to the limit: this work was accepted before.
    pub fn push_front_all(&mut self, items: Vec<Outbound>) {
        for item in items.into_iter().rev() {
            self.items.push_front(item);
        }
    }

    /// Removes every item and hands it to `sink`, oldest first.
    pub fn drain_to<F>(&mut self, mut sink: F) -> usize
    where
        F: FnMut(Outbound),
    {
        let count = self.items.len();
        while let Some(item) = self.items.pop_front() {
            sink(item);
        }
        count
    }

    /// Rejects every queued item with `err`. Returns how many were rejected.
    pub fn reject_all(&mut self, err: ClientError) -> usize {
        self.drain_to(|item| item.reject(err.clone()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Submission sequence numbers in queue order.
    pub fn sequence(&self) -> Vec<u64> {
        self.items.iter().map(Outbound::seq).collect()
    }
}
