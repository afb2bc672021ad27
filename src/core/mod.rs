// src/core/mod.rs

//! The transport-independent core of the client: commands, the RESP codec,
//! errors and the command queues.

pub mod commands;
pub mod errors;
pub mod protocol;
pub mod queue;

pub use commands::Command;
pub use errors::ClientError;
pub use protocol::RespValue;
