// src/connection/state.rs

//! Connection states and the events the client publishes as it moves between them.

use crate::core::queue::ConnectionEpoch;
use std::fmt;
use std::time::Duration;

/// The lifecycle of the client's single logical connection.
///
/// `Connecting -> Ready -> Reconnecting -> Ready -> ... -> Closed`.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Ready,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn is_ready(self) -> bool {
        self == ConnectionState::Ready
    }

    pub fn is_closed(self) -> bool {
        self == ConnectionState::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lifecycle notifications, delivered over a broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A socket was opened.
    Connected { epoch: ConnectionEpoch },
    /// The connection accepts commands; queued work has been flushed to it.
    Ready { epoch: ConnectionEpoch },
    /// The connection for `epoch` was lost.
    Disconnected {
        epoch: ConnectionEpoch,
        reason: String,
    },
    /// A reconnection attempt is scheduled after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// The client is closed for good.
    Closed,
}
