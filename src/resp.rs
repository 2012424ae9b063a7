//! RESP wire format: value tree, encoder and an incremental frame reader.

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("Frame contains invalid UTF-8")]
    InvalidUtf8,
    #[error("Unknown RESP type marker")]
    UnknownTypeMarker,
    #[error("Invalid integer frame")]
    InvalidInteger,
    #[error("Invalid bulk string frame")]
    InvalidBulkString,
    #[error("Invalid array frame")]
    InvalidArray,
    #[error("Connection closed in the middle of a frame")]
    UnexpectedEof,
    #[error("I/O error while reading frame: {0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Serializes the value into its wire representation. Bulk string
    /// lengths are UTF-8 byte counts, not character counts.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(value) => format!("+{}\r\n", value),
            RespValue::Error(value) => format!("-{}\r\n", value),
            RespValue::Integer(value) => format!(":{}\r\n", value),
            RespValue::BulkString(value) => format!("${}\r\n{}\r\n", value.len(), value),
            RespValue::NullBulkString => String::from("$-1\r\n"),
            RespValue::Array(items) => {
                let mut encoded = format!("*{}\r\n", items.len());

                for item in items {
                    encoded.push_str(&item.encode());
                }

                encoded
            }
        }
    }

    /// Builds the array-of-bulk-strings form used for every command that
    /// travels between servers.
    pub fn command(parts: &[&str]) -> RespValue {
        RespValue::Array(
            parts
                .iter()
                .map(|part| RespValue::BulkString(part.to_string()))
                .collect(),
        )
    }
}

// Limits on what a single frame may declare. A count or length past
// these is treated as malformed rather than waited on, so one hostile
// header cannot drive a huge allocation or unbounded recursion.
const MAX_ARRAY_LENGTH: usize = 1024 * 1024;
const MAX_ARRAY_DEPTH: usize = 32;
const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;

fn find_crlf(buffer: &[u8], from: usize) -> Option<usize> {
    buffer[from..]
        .windows(2)
        .position(|window| window == b"\r\n")
        .map(|position| from + position)
}

fn parse_at(
    buffer: &[u8],
    position: usize,
    depth: usize,
) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some(&marker) = buffer.get(position) else {
        return Ok(None);
    };
    let Some(line_end) = find_crlf(buffer, position + 1) else {
        return Ok(None);
    };

    let line = std::str::from_utf8(&buffer[position + 1..line_end])
        .map_err(|_| RespError::InvalidUtf8)?;
    let after_line = line_end + 2;

    match marker {
        b'+' => Ok(Some((RespValue::SimpleString(line.to_string()), after_line))),
        b'-' => Ok(Some((RespValue::Error(line.to_string()), after_line))),
        b':' => {
            let value = line.parse::<i64>().map_err(|_| RespError::InvalidInteger)?;
            Ok(Some((RespValue::Integer(value), after_line)))
        }
        b'$' => {
            let declared_length = line
                .parse::<i64>()
                .map_err(|_| RespError::InvalidBulkString)?;

            if declared_length == -1 {
                return Ok(Some((RespValue::NullBulkString, after_line)));
            }

            let length =
                usize::try_from(declared_length).map_err(|_| RespError::InvalidBulkString)?;

            if length > MAX_BULK_LENGTH {
                return Err(RespError::InvalidBulkString);
            }

            let content_end = after_line + length;

            if buffer.len() < content_end + 2 {
                return Ok(None);
            }

            if &buffer[content_end..content_end + 2] != b"\r\n" {
                return Err(RespError::InvalidBulkString);
            }

            let content = std::str::from_utf8(&buffer[after_line..content_end])
                .map_err(|_| RespError::InvalidUtf8)?;

            Ok(Some((
                RespValue::BulkString(content.to_string()),
                content_end + 2,
            )))
        }
        b'*' => {
            let count = line.parse::<usize>().map_err(|_| RespError::InvalidArray)?;

            if count > MAX_ARRAY_LENGTH || depth >= MAX_ARRAY_DEPTH {
                return Err(RespError::InvalidArray);
            }

            // the smallest element is three bytes, so only reserve for
            // what the buffer could actually hold
            let available = buffer.len().saturating_sub(after_line);
            let mut items = Vec::with_capacity(count.min(available / 3));
            let mut cursor = after_line;

            for _ in 0..count {
                match parse_at(buffer, cursor, depth + 1)? {
                    Some((item, next_cursor)) => {
                        items.push(item);
                        cursor = next_cursor;
                    }
                    None => return Ok(None),
                }
            }

            Ok(Some((RespValue::Array(items), cursor)))
        }
        _ => Err(RespError::UnknownTypeMarker),
    }
}

/// Attempts to parse one complete value from the front of `buffer`.
///
/// Returns `Ok(None)` when the buffer holds only a prefix of a frame, so
/// callers can read more bytes and retry. On success the returned `usize`
/// is the number of bytes the frame occupied.
pub fn try_parse(buffer: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
    parse_at(buffer, 0, 0)
}

/// Buffered reader that turns a byte stream into RESP frames.
///
/// Partial frames stay in the buffer until the rest arrives and pipelined
/// frames are handed out one at a time, which is what both the client loop
/// and the replication link need.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        FrameReader {
            reader,
            buffer: BytesMut::with_capacity(4096),
        }
    }

    async fn fill(&mut self) -> Result<usize, RespError> {
        self.reader
            .read_buf(&mut self.buffer)
            .await
            .map_err(|error| RespError::Io(error.to_string()))
    }

    /// Reads the next complete frame. `Ok(None)` means the peer closed the
    /// connection cleanly between frames.
    pub async fn read_frame(&mut self) -> Result<Option<RespValue>, RespError> {
        loop {
            if let Some((value, consumed)) = try_parse(&self.buffer)? {
                self.buffer.advance(consumed);
                return Ok(Some(value));
            }

            if self.fill().await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }

                return Err(RespError::UnexpectedEof);
            }
        }
    }

    /// Reads a raw CRLF-terminated line, without the terminator.
    pub async fn read_line(&mut self) -> Result<String, RespError> {
        loop {
            if let Some(line_end) = find_crlf(&self.buffer, 0) {
                let line = self.buffer.split_to(line_end + 2);
                let content = std::str::from_utf8(&line[..line.len() - 2])
                    .map_err(|_| RespError::InvalidUtf8)?;

                return Ok(content.to_string());
            }

            if self.fill().await? == 0 {
                return Err(RespError::UnexpectedEof);
            }
        }
    }

    /// Reads a `$<length>\r\n` header followed by exactly `length` raw
    /// bytes with no trailing CRLF. This is the snapshot payload shape a
    /// master sends right after a full-resync marker.
    pub async fn read_payload(&mut self) -> Result<Vec<u8>, RespError> {
        let header = self.read_line().await?;
        let length = header
            .strip_prefix('$')
            .ok_or(RespError::InvalidBulkString)?
            .parse::<usize>()
            .map_err(|_| RespError::InvalidBulkString)?;

        while self.buffer.len() < length {
            if self.fill().await? == 0 {
                return Err(RespError::UnexpectedEof);
            }
        }

        Ok(self.buffer.split_to(length).to_vec())
    }
}
