//! An in-memory key-value and stream database speaking the RESP protocol.
//!
//! The server supports plain string keys with millisecond expiry, append
//! only streams with blocking reads, MULTI/EXEC transactions, reading a
//! subset of the RDB snapshot format and master/replica replication with
//! acknowledgement tracking for WAIT.

pub mod commands;
pub mod config;
pub mod connection;
pub mod engine;
pub mod replica_link;
pub mod replication;
pub mod resp;
pub mod server;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod stream;
pub mod transaction;
