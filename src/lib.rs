// src/lib.rs

pub mod client;
pub mod config;
pub mod connection;
pub mod core;

// Re-export
pub use crate::client::{Client, ReplyFuture, Transaction};
pub use crate::config::{ClientConfig, QueueOptions};
pub use crate::connection::{ClientEvent, ConnectionState};
pub use crate::core::{ClientError, Command, RespValue};
