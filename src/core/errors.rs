// src/core/errors.rs

//! Defines the primary error type for the client.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing every way a submitted command can fail.
/// Each pending command settles with exactly one of these or with a reply.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A reply arrived while no command was waiting for one. The reply stream and
    /// the command queue are out of step, so the connection must be reset.
    #[error("Protocol integrity violation: {0}")]
    ProtocolIntegrity(String),

    /// The command could not be fulfilled because the connection went away.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// The command was refused before being queued (offline queue disabled or full).
    #[error("Command rejected: {0}")]
    QueueRejected(String),

    /// The server discarded the transaction (a watched key was modified).
    #[error("Transaction aborted (WATCH failed)")]
    TransactionAborted,

    /// The server refused to run EXEC because a command failed to queue.
    #[error("EXECABORT {0}")]
    ExecAborted(String),

    /// An error reply sent by the server for a single command.
    #[error("{0}")]
    Reply(String),

    #[error("Command not allowed in the current state: {0}")]
    InvalidState(String),

    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Incomplete data in stream")]
    IncompleteData,

    #[error("Syntax error")]
    SyntaxError,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Returns true for errors caused by losing the connection, as opposed to
    /// errors reported by the server.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionClosed(_) | ClientError::Io(_) | ClientError::QueueRejected(_)
        )
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for ClientError {
    fn clone(&self) -> Self {
        match self {
            ClientError::ProtocolIntegrity(s) => ClientError::ProtocolIntegrity(s.clone()),
            ClientError::ConnectionClosed(s) => ClientError::ConnectionClosed(s.clone()),
            ClientError::QueueRejected(s) => ClientError::QueueRejected(s.clone()),
            ClientError::TransactionAborted => ClientError::TransactionAborted,
            ClientError::ExecAborted(s) => ClientError::ExecAborted(s.clone()),
            ClientError::Reply(s) => ClientError::Reply(s.clone()),
            ClientError::InvalidState(s) => ClientError::InvalidState(s.clone()),
            ClientError::Io(e) => ClientError::Io(Arc::clone(e)),
            ClientError::IncompleteData => ClientError::IncompleteData,
            ClientError::SyntaxError => ClientError::SyntaxError,
            ClientError::InvalidRequest(s) => ClientError::InvalidRequest(s.clone()),
        }
    }
}

impl PartialEq for ClientError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ClientError::Io(e1), ClientError::Io(e2)) => e1.to_string() == e2.to_string(),
            (ClientError::ProtocolIntegrity(s1), ClientError::ProtocolIntegrity(s2)) => s1 == s2,
            (ClientError::ConnectionClosed(s1), ClientError::ConnectionClosed(s2)) => s1 == s2,
            (ClientError::QueueRejected(s1), ClientError::QueueRejected(s2)) => s1 == s2,
            (ClientError::ExecAborted(s1), ClientError::ExecAborted(s2)) => s1 == s2,
            (ClientError::Reply(s1), ClientError::Reply(s2)) => s1 == s2,
            (ClientError::InvalidState(s1), ClientError::InvalidState(s2)) => s1 == s2,
            (ClientError::InvalidRequest(s1), ClientError::InvalidRequest(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(Arc::new(e))
    }
}

impl From<std::string::FromUtf8Error> for ClientError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        ClientError::SyntaxError
    }
}

impl From<std::num::ParseIntError> for ClientError {
    fn from(_: std::num::ParseIntError) -> Self {
        ClientError::SyntaxError
    }
}
