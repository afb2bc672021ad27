// src/core/protocol/resp_frame.rs

//! The RESP frame type exchanged with the server, and the `tokio_util` codec
//! that turns outgoing commands into bytes and incoming bytes into replies.

use crate::core::ClientError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const CRLF: &[u8] = b"\r\n";
const CRLF_LEN: usize = 2;

// Limits applied to replies so a misbehaving server cannot exhaust client memory.
const MAX_REPLY_ELEMENTS: usize = 1_024 * 1_024;
const MAX_BULK_REPLY_SIZE: usize = 512 * 1024 * 1024;
const MAX_NESTING_DEPTH: usize = 256;

/// A single RESP frame, as written to or read from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RespFrame {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    Null,
    NullArray,
    Array(Vec<RespFrame>),
}

impl RespFrame {
    /// Builds the multi-bulk request frame for a command name and its arguments.
    pub fn request<I>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        let mut parts = vec![RespFrame::BulkString(Bytes::copy_from_slice(name.as_bytes()))];
        parts.extend(args.into_iter().map(RespFrame::BulkString));
        RespFrame::Array(parts)
    }

    /// True for the `+QUEUED` acknowledgement the server sends for each
    /// command staged inside `MULTI`.
    pub fn is_queued_ack(&self) -> bool {
        matches!(self, RespFrame::SimpleString(s) if s.eq_ignore_ascii_case("QUEUED"))
    }

    /// True for a plain `+OK` status reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, RespFrame::SimpleString(s) if s.eq_ignore_ascii_case("OK"))
    }

    /// Appends the wire encoding of the frame to `dst`. Encoding cannot fail.
    pub fn write_to(&self, dst: &mut BytesMut) {
        write_frame(self, dst);
    }

    /// Encodes the frame into a fresh byte vector.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, ClientError> {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf);
        Ok(buf.to_vec())
    }
}

/// Codec for `RespFrame`s. Stateless; a new value can be created per stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct RespFrameCodec;

impl Encoder<RespFrame> for RespFrameCodec {
    type Error = ClientError;

    fn encode(&mut self, item: RespFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write_to(dst);
        Ok(())
    }
}

fn write_line(prefix: u8, body: &[u8], dst: &mut BytesMut) {
    dst.reserve(body.len() + 3);
    dst.put_u8(prefix);
    dst.put_slice(body);
    dst.put_slice(CRLF);
}

fn write_frame(frame: &RespFrame, dst: &mut BytesMut) {
    match frame {
        RespFrame::SimpleString(s) => write_line(b'+', s.as_bytes(), dst),
        RespFrame::Error(s) => write_line(b'-', s.as_bytes(), dst),
        RespFrame::Integer(i) => write_line(b':', i.to_string().as_bytes(), dst),
        RespFrame::BulkString(b) => {
            write_line(b'$', b.len().to_string().as_bytes(), dst);
            dst.reserve(b.len() + CRLF_LEN);
            dst.put_slice(b);
            dst.put_slice(CRLF);
        }
        RespFrame::Null => dst.put_slice(b"$-1\r\n"),
        RespFrame::NullArray => dst.put_slice(b"*-1\r\n"),
        RespFrame::Array(items) => {
            write_line(b'*', items.len().to_string().as_bytes(), dst);
            for item in items {
                write_frame(item, dst);
            }
        }
    }
}

impl Decoder for RespFrameCodec {
    type Item = RespFrame;
    type Error = ClientError;

    /// Decodes one complete frame, leaving partial input in the buffer until
    /// the rest of it arrives.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut cursor = &src[..];
        match parse_frame(&mut cursor, 0) {
            Ok(frame) => {
                let consumed = src.len() - cursor.len();
                src.advance(consumed);
                Ok(Some(frame))
            }
            Err(ClientError::IncompleteData) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn parse_frame(cursor: &mut &[u8], depth: usize) -> Result<RespFrame, ClientError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ClientError::InvalidRequest(
            "RESP reply nesting limit exceeded".to_string(),
        ));
    }
    let Some((&tag, rest)) = cursor.split_first() else {
        return Err(ClientError::IncompleteData);
    };
    *cursor = rest;

    match tag {
        b'+' => Ok(RespFrame::SimpleString(lossy(read_line(cursor)?))),
        b'-' => Ok(RespFrame::Error(lossy(read_line(cursor)?))),
        b':' => Ok(RespFrame::Integer(read_number(cursor)?)),
        b'$' => {
            let len = read_number(cursor)?;
            if len == -1 {
                return Ok(RespFrame::Null);
            }
            let len = checked_len(len, MAX_BULK_REPLY_SIZE)?;
            if cursor.len() < len + CRLF_LEN {
                return Err(ClientError::IncompleteData);
            }
            if &cursor[len..len + CRLF_LEN] != CRLF {
                return Err(ClientError::SyntaxError);
            }
            let data = Bytes::copy_from_slice(&cursor[..len]);
            *cursor = &cursor[len + CRLF_LEN..];
            Ok(RespFrame::BulkString(data))
        }
        b'*' => {
            let len = read_number(cursor)?;
            if len == -1 {
                return Ok(RespFrame::NullArray);
            }
            let len = checked_len(len, MAX_REPLY_ELEMENTS)?;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(parse_frame(cursor, depth + 1)?);
            }
            Ok(RespFrame::Array(items))
        }
        _ => Err(ClientError::SyntaxError),
    }
}

fn read_line<'a>(cursor: &mut &'a [u8]) -> Result<&'a [u8], ClientError> {
    let pos = cursor
        .windows(CRLF_LEN)
        .position(|w| w == CRLF)
        .ok_or(ClientError::IncompleteData)?;
    let line = &cursor[..pos];
    *cursor = &cursor[pos + CRLF_LEN..];
    Ok(line)
}

fn read_number(cursor: &mut &[u8]) -> Result<i64, ClientError> {
    let line = read_line(cursor)?;
    std::str::from_utf8(line)
        .map_err(|_| ClientError::SyntaxError)?
        .parse::<i64>()
        .map_err(|_| ClientError::SyntaxError)
}

fn checked_len(len: i64, max: usize) -> Result<usize, ClientError> {
    if len < 0 || len as u64 > max as u64 {
        return Err(ClientError::SyntaxError);
    }
    Ok(len as usize)
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}
