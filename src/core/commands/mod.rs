// src/core/commands/mod.rs

//! Command values and the bookkeeping attached to them once submitted.

pub mod command;
pub mod pending;

pub use command::Command;
pub use pending::{CommandResult, ExecResult, PendingCommand, Responder};
