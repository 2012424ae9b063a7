//! In-memory keyspace holding string and stream values with lazy expiry.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::stream::{StreamEntry, StreamId};

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("key holds the wrong kind of value")]
    WrongKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(String),
    Stream(Vec<StreamEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub data: DataType,
    /// Absolute expiry in epoch milliseconds. `None` means the entry lives
    /// until it is overwritten.
    pub expires_at: Option<u64>,
}

pub fn now_milliseconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Default)]
pub struct Store {
    entries: HashMap<String, Entry>,
}

impl Store {
    pub fn new() -> Self {
        Store {
            entries: HashMap::new(),
        }
    }

    /// Expired entries are never swept in the background, they are dropped
    /// on the next access to their key.
    fn purge_if_expired(&mut self, key: &str) {
        if let Some(entry) = self.entries.get(key) {
            if let Some(expires_at) = entry.expires_at {
                if now_milliseconds() >= expires_at {
                    self.entries.remove(key);
                }
            }
        }
    }

    /// Stores a string value, replacing any previous value and expiry for
    /// the key.
    pub fn set(&mut self, key: String, value: String, time_to_live_milliseconds: Option<u64>) {
        let expires_at =
            time_to_live_milliseconds.map(|time_to_live| now_milliseconds() + time_to_live);

        self.entries.insert(
            key,
            Entry {
                data: DataType::String(value),
                expires_at,
            },
        );
    }

    pub fn get(&mut self, key: &str) -> Option<String> {
        self.purge_if_expired(key);

        match self.entries.get(key) {
            Some(Entry {
                data: DataType::String(value),
                ..
            }) => Some(value.clone()),
            _ => None,
        }
    }

    /// Value kind for the TYPE command. `None` means the key does not exist.
    pub fn kind(&mut self, key: &str) -> Option<&'static str> {
        self.purge_if_expired(key);

        match self.entries.get(key) {
            Some(Entry {
                data: DataType::String(_),
                ..
            }) => Some("string"),
            Some(Entry {
                data: DataType::Stream(_),
                ..
            }) => Some("stream"),
            None => None,
        }
    }

    /// Increments the integer stored at `key`, treating a missing key as 0.
    /// The entry's expiry is left untouched.
    pub fn increment(&mut self, key: &str) -> Result<i64, StoreError> {
        self.purge_if_expired(key);

        match self.entries.get_mut(key) {
            None => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        data: DataType::String(String::from("1")),
                        expires_at: None,
                    },
                );

                Ok(1)
            }
            Some(entry) => match &mut entry.data {
                DataType::String(value) => {
                    let incremented = value
                        .parse::<i64>()
                        .map_err(|_| StoreError::NotAnInteger)?
                        .checked_add(1)
                        .ok_or(StoreError::NotAnInteger)?;

                    *value = incremented.to_string();

                    Ok(incremented)
                }
                DataType::Stream(_) => Err(StoreError::NotAnInteger),
            },
        }
    }

    /// ID of the newest entry in the stream at `key`, if any.
    pub fn last_stream_id(&self, key: &str) -> Result<Option<StreamId>, StoreError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry {
                data: DataType::Stream(entries),
                ..
            }) => Ok(entries.last().map(|entry| entry.id)),
            Some(_) => Err(StoreError::WrongKind),
        }
    }

    pub fn stream_entries(&self, key: &str) -> Result<Option<&[StreamEntry]>, StoreError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry {
                data: DataType::Stream(entries),
                ..
            }) => Ok(Some(entries)),
            Some(_) => Err(StoreError::WrongKind),
        }
    }

    /// Appends an entry to the stream at `key`, creating the stream when
    /// the key does not exist yet. ID ordering is the caller's concern.
    pub fn append_stream_entry(&mut self, key: &str, entry: StreamEntry) -> Result<(), StoreError> {
        match self.entries.get_mut(key) {
            None => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        data: DataType::Stream(vec![entry]),
                        expires_at: None,
                    },
                );

                Ok(())
            }
            Some(existing) => match &mut existing.data {
                DataType::Stream(entries) => {
                    entries.push(entry);
                    Ok(())
                }
                DataType::String(_) => Err(StoreError::WrongKind),
            },
        }
    }
}
