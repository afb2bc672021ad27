// src/core/protocol/resp_value.rs

//! Defines the reply value handed back to callers.

use super::RespFrame;
use crate::core::ClientError;
use bytes::Bytes;

/// `RespValue` is the caller-facing form of a reply.
///
/// A top-level `-ERR` frame never becomes a `RespValue`; it settles the
/// command's future with `ClientError::Reply` instead. Errors nested inside
/// arrays are kept as `RespValue::Error` so the surrounding value is intact.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    BulkString(Bytes),
    Integer(i64),
    Array(Vec<RespValue>),
    Null,
    NullArray,
    Error(String),
}

impl RespValue {
    /// Shortcut for building the bulk string replies most commands return.
    pub fn bulk(s: impl Into<Bytes>) -> Self {
        RespValue::BulkString(s.into())
    }

    /// Returns the reply as UTF-8 text when it is a simple or bulk string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Converts a reply frame into the result a single command settles with.
    pub fn from_reply(frame: RespFrame) -> Result<RespValue, ClientError> {
        match frame {
            RespFrame::Error(msg) => Err(ClientError::Reply(msg)),
            other => Ok(other.into()),
        }
    }
}

impl From<RespFrame> for RespValue {
    fn from(frame: RespFrame) -> Self {
        match frame {
            RespFrame::SimpleString(s) => RespValue::SimpleString(s),
            RespFrame::Error(s) => RespValue::Error(s),
            RespFrame::Integer(i) => RespValue::Integer(i),
            RespFrame::BulkString(b) => RespValue::BulkString(b),
            RespFrame::Null => RespValue::Null,
            RespFrame::NullArray => RespValue::NullArray,
            RespFrame::Array(items) => RespValue::Array(items.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<RespValue> for RespFrame {
    fn from(val: RespValue) -> Self {
        match val {
            RespValue::SimpleString(s) => RespFrame::SimpleString(s),
            RespValue::BulkString(b) => RespFrame::BulkString(b),
            RespValue::Integer(i) => RespFrame::Integer(i),
            RespValue::Array(arr) => RespFrame::Array(arr.into_iter().map(Into::into).collect()),
            RespValue::Null => RespFrame::Null,
            RespValue::NullArray => RespFrame::NullArray,
            RespValue::Error(s) => RespFrame::Error(s),
        }
    }
}
