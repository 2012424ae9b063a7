//! Stream entry IDs and the helpers shared by XADD, XRANGE and XREAD.

use std::fmt;

use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum StreamIdError {
    #[error("Invalid stream ID format")]
    InvalidFormat,
    #[error("The ID specified in XADD must be greater than 0-0")]
    ZeroId,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    NotGreaterThanTop,
}

/// Stream entry ID, ordered by milliseconds first and sequence second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub milliseconds: u64,
    pub sequence: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId {
        milliseconds: 0,
        sequence: 0,
    };
    pub const MAX: StreamId = StreamId {
        milliseconds: u64::MAX,
        sequence: u64::MAX,
    };

    pub fn new(milliseconds: u64, sequence: u64) -> Self {
        StreamId {
            milliseconds,
            sequence,
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.milliseconds, self.sequence)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(String, String)>,
}

/// ID argument accepted by XADD: fully explicit, explicit milliseconds with
/// an auto-generated sequence, or fully auto-generated.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestedId {
    Auto,
    AutoSequence(u64),
    Explicit(StreamId),
}

impl RequestedId {
    pub fn parse(raw: &str) -> Result<Self, StreamIdError> {
        if raw == "*" {
            return Ok(RequestedId::Auto);
        }

        let Some((milliseconds, sequence)) = raw.split_once('-') else {
            return Err(StreamIdError::InvalidFormat);
        };

        let milliseconds = milliseconds
            .parse::<u64>()
            .map_err(|_| StreamIdError::InvalidFormat)?;

        if sequence == "*" {
            return Ok(RequestedId::AutoSequence(milliseconds));
        }

        let sequence = sequence
            .parse::<u64>()
            .map_err(|_| StreamIdError::InvalidFormat)?;

        Ok(RequestedId::Explicit(StreamId::new(milliseconds, sequence)))
    }

    /// Turns the requested ID into a concrete one, validated against the
    /// current top entry of the stream.
    ///
    /// A bare `*` takes the wall clock time with sequence 0, or the next
    /// sequence when the top entry already carries the same millisecond.
    /// `<ms>-*` continues the top entry's sequence for a matching
    /// millisecond and otherwise starts at 0, except for millisecond 0
    /// where it starts at 1 because 0-0 is reserved.
    pub fn resolve(
        &self,
        top: Option<StreamId>,
        now_milliseconds: u64,
    ) -> Result<StreamId, StreamIdError> {
        let id = match self {
            RequestedId::Auto => {
                let sequence = match top {
                    Some(top_id) if top_id.milliseconds == now_milliseconds => top_id.sequence + 1,
                    _ => 0,
                };

                StreamId::new(now_milliseconds, sequence)
            }
            RequestedId::AutoSequence(milliseconds) => {
                let sequence = match top {
                    Some(top_id) if top_id.milliseconds == *milliseconds => top_id.sequence + 1,
                    _ if *milliseconds == 0 => 1,
                    _ => 0,
                };

                StreamId::new(*milliseconds, sequence)
            }
            RequestedId::Explicit(id) => *id,
        };

        if id <= StreamId::MIN {
            return Err(StreamIdError::ZeroId);
        }

        if let Some(top_id) = top {
            if id <= top_id {
                return Err(StreamIdError::NotGreaterThanTop);
            }
        }

        Ok(id)
    }
}

fn parse_bound(raw: &str, default_sequence: u64) -> Result<StreamId, StreamIdError> {
    match raw.split_once('-') {
        Some((milliseconds, sequence)) => {
            let milliseconds = milliseconds
                .parse::<u64>()
                .map_err(|_| StreamIdError::InvalidFormat)?;
            let sequence = sequence
                .parse::<u64>()
                .map_err(|_| StreamIdError::InvalidFormat)?;

            Ok(StreamId::new(milliseconds, sequence))
        }
        None => {
            let milliseconds = raw
                .parse::<u64>()
                .map_err(|_| StreamIdError::InvalidFormat)?;

            Ok(StreamId::new(milliseconds, default_sequence))
        }
    }
}

/// Start bound for XRANGE. `-` is the smallest possible ID and a bare
/// millisecond value gets sequence 0.
pub fn parse_range_start(raw: &str) -> Result<StreamId, StreamIdError> {
    if raw == "-" {
        return Ok(StreamId::MIN);
    }

    parse_bound(raw, 0)
}

/// End bound for XRANGE. `+` is the largest possible ID and a bare
/// millisecond value covers every sequence within it.
pub fn parse_range_end(raw: &str) -> Result<StreamId, StreamIdError> {
    if raw == "+" {
        return Ok(StreamId::MAX);
    }

    parse_bound(raw, u64::MAX)
}

pub fn entries_in_range(entries: &[StreamEntry], start: StreamId, end: StreamId) -> Vec<StreamEntry> {
    entries
        .iter()
        .filter(|entry| entry.id >= start && entry.id <= end)
        .cloned()
        .collect()
}

pub fn entries_after(entries: &[StreamEntry], after: StreamId) -> Vec<StreamEntry> {
    entries
        .iter()
        .filter(|entry| entry.id > after)
        .cloned()
        .collect()
}

/// Encodes entries as the nested array shape shared by XRANGE and XREAD:
/// each entry becomes `[id, [field, value, ...]]`.
pub fn entries_to_resp(entries: &[StreamEntry]) -> RespValue {
    RespValue::Array(
        entries
            .iter()
            .map(|entry| {
                let mut flattened_fields = Vec::with_capacity(entry.fields.len() * 2);

                for (field, value) in &entry.fields {
                    flattened_fields.push(RespValue::BulkString(field.clone()));
                    flattened_fields.push(RespValue::BulkString(value.clone()));
                }

                RespValue::Array(vec![
                    RespValue::BulkString(entry.id.to_string()),
                    RespValue::Array(flattened_fields),
                ])
            })
            .collect(),
    )
}
