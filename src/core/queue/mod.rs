// src/core/queue/mod.rs

//! The in-memory command queues: the reply FIFO, the offline/resend queue and
//! transaction staging. None of these know about sockets; the connection
//! controller owns them and decides when work moves between them.

pub mod entry;
pub mod offline_queue;
pub mod reply_matcher;
pub mod transaction;

pub use entry::{ConnectionEpoch, InFlightTransaction, Outbound, PendingEntry, TransactionBatch};
pub use offline_queue::OfflineQueue;
pub use reply_matcher::ReplyMatcher;
pub use transaction::{TransactionBuilder, TransactionContext};
