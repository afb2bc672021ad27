// src/connection/mod.rs

//! Owns the single logical connection to the server: opening and reopening
//! the socket, and the controller task that serializes every write and every
//! queue mutation.

mod controller;
mod state;
mod supervisor;
mod transport;

pub use controller::{ControlMessage, Controller};
pub use state::{ClientEvent, ConnectionState};
pub use supervisor::{ConnectionEvent, Supervisor};
pub use transport::{BoxedReader, BoxedWriter, Connector, TcpConnector};
