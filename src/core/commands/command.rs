// src/core/commands/command.rs

//! The `Command` value callers build and submit.

use crate::core::protocol::RespFrame;
use bytes::Bytes;
use std::fmt;

/// A command verb plus its ordered arguments.
///
/// Built with a small builder API:
///
/// ```
/// use spineldb_client::core::Command;
/// let cmd = Command::new("SET").arg("key").arg("value");
/// assert_eq!(cmd.name(), "SET");
/// assert_eq!(cmd.args().len(), 2);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
}

impl Command {
    /// Creates a command with no arguments. The verb is stored upper-cased.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_ascii_uppercase(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends every argument in order.
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// True for the verbs that delimit a transaction block. These are emitted by
    /// the transaction machinery itself and cannot be submitted directly.
    pub fn is_transaction_control(&self) -> bool {
        matches!(self.name.as_str(), "MULTI" | "EXEC" | "DISCARD")
    }

    /// Converts the command into its multi-bulk request frame.
    pub fn to_frame(&self) -> RespFrame {
        RespFrame::request(&self.name, self.args.iter().cloned())
    }

    pub fn ping(message: Option<&str>) -> Self {
        let cmd = Command::new("PING");
        match message {
            Some(m) => cmd.arg(m.to_string()),
            None => cmd,
        }
    }

    pub fn echo(message: impl Into<Bytes>) -> Self {
        Command::new("ECHO").arg(message)
    }

    pub fn get(key: impl Into<Bytes>) -> Self {
        Command::new("GET").arg(key)
    }

    pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Command::new("SET").arg(key).arg(value)
    }

    pub fn del<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        Command::new("DEL").with_args(keys)
    }

    pub(crate) fn multi() -> Self {
        Command::new("MULTI")
    }

    pub(crate) fn exec() -> Self {
        Command::new("EXEC")
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", String::from_utf8_lossy(arg))?;
        }
        Ok(())
    }
}

impl From<Command> for RespFrame {
    fn from(cmd: Command) -> Self {
        RespFrame::request(&cmd.name, cmd.args)
    }
}
