//! Master-side replication state: connected replica sessions, write
//! propagation and acknowledgement counting for WAIT.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio::time::{timeout, Instant};
use tracing::warn;

use crate::resp::RespValue;

pub const REPLICATION_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

/// Upper bound on a single propagation write. A replica that cannot keep
/// up within this window gets dropped instead of stalling the master.
const PROPAGATION_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Master,
    Replica { master_host: String, master_port: u16 },
}

impl Role {
    /// Role name as reported by INFO.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Replica { .. } => "slave",
        }
    }

    pub fn is_replica(&self) -> bool {
        matches!(self, Role::Replica { .. })
    }
}

#[derive(Debug)]
struct ReplicaSession {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    acknowledged_offset: u64,
}

#[derive(Debug)]
pub struct ReplicationState {
    pub role: Role,
    pub replication_id: String,
    sessions: RwLock<HashMap<String, ReplicaSession>>,
    /// On a master this counts bytes propagated to replicas, on a replica
    /// it counts bytes of master commands applied so far.
    offset: AtomicU64,
    acknowledgements: AtomicUsize,
    acknowledgement_signal: Notify,
    any_write_propagated: AtomicBool,
    /// Frames queue here in apply order and a single drain task writes
    /// them out, so replicas always see writes in the order the store
    /// took them.
    propagation_sender: mpsc::UnboundedSender<String>,
    propagation_receiver: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl ReplicationState {
    pub fn new(role: Role) -> Self {
        let (propagation_sender, propagation_receiver) = mpsc::unbounded_channel();

        ReplicationState {
            role,
            replication_id: String::from(REPLICATION_ID),
            sessions: RwLock::new(HashMap::new()),
            offset: AtomicU64::new(0),
            acknowledgements: AtomicUsize::new(0),
            acknowledgement_signal: Notify::new(),
            any_write_propagated: AtomicBool::new(false),
            propagation_sender,
            propagation_receiver: Mutex::new(Some(propagation_receiver)),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    pub fn add_offset(&self, bytes: u64) {
        self.offset.fetch_add(bytes, Ordering::SeqCst);
    }

    pub async fn replica_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Registers the write half of a client connection that completed a
    /// PSYNC, keyed by its peer address.
    pub async fn register_replica(&self, address: &str, writer: Arc<Mutex<OwnedWriteHalf>>) {
        self.sessions.write().await.insert(
            address.to_string(),
            ReplicaSession {
                writer,
                acknowledged_offset: 0,
            },
        );
    }

    pub async fn remove_replica(&self, address: &str) {
        self.sessions.write().await.remove(address);
    }

    /// Records a `REPLCONF ACK` from a replica and wakes any WAIT that is
    /// counting acknowledgements.
    pub async fn record_acknowledgement(&self, address: &str, offset: u64) {
        if let Some(session) = self.sessions.write().await.get_mut(address) {
            session.acknowledged_offset = offset;
        }

        self.acknowledgements.fetch_add(1, Ordering::SeqCst);
        self.acknowledgement_signal.notify_waiters();
    }

    async fn write_to_sessions(&self, frame: &str) {
        let mut unreachable = Vec::new();

        {
            let sessions = self.sessions.read().await;

            for (address, session) in sessions.iter() {
                let writer = Arc::clone(&session.writer);
                let write = async {
                    let mut writer = writer.lock().await;
                    writer.write_all(frame.as_bytes()).await?;
                    writer.flush().await
                };

                match timeout(PROPAGATION_WRITE_TIMEOUT, write).await {
                    Ok(Ok(())) => {}
                    _ => {
                        warn!(replica = %address, "dropping unreachable replica session");
                        unreachable.push(address.clone());
                    }
                }
            }
        }

        if !unreachable.is_empty() {
            let mut sessions = self.sessions.write().await;

            for address in unreachable {
                sessions.remove(&address);
            }
        }
    }

    /// Advances the master offset by the frame's canonical encoded length
    /// and hands it to the drain task. Synchronous, so callers can queue
    /// while still holding the store lock.
    fn queue_frame(&self, frame: String) {
        self.add_offset(frame.len() as u64);
        let _ = self.propagation_sender.send(frame);
    }

    /// Queues a write command for every connected replica.
    pub fn propagate_set(&self, key: &str, value: &str) {
        self.any_write_propagated.store(true, Ordering::SeqCst);
        self.queue_frame(RespValue::command(&["SET", key, value]).encode());
    }

    /// Drains the propagation queue until the state is dropped. Runs as
    /// exactly one task per server, spawned at startup.
    pub async fn run_propagation(&self) {
        let receiver = self.propagation_receiver.lock().await.take();
        let Some(mut receiver) = receiver else {
            return;
        };

        while let Some(frame) = receiver.recv().await {
            self.write_to_sessions(&frame).await;
        }
    }

    /// WAIT. Broadcasts a `REPLCONF GETACK *` probe and then sleeps until
    /// enough acknowledgements arrive or the timeout runs out.
    ///
    /// When no write was ever propagated the acknowledgement counter says
    /// nothing, so the reply falls back to the number of connected
    /// replicas, which are all trivially up to date.
    pub async fn wait_for_acknowledgements(
        &self,
        target_replicas: usize,
        timeout_milliseconds: u64,
    ) -> usize {
        self.acknowledgements.store(0, Ordering::SeqCst);

        // the probe rides the same queue as writes so a replica never
        // sees it before the writes it is meant to acknowledge
        self.queue_frame(RespValue::command(&["REPLCONF", "GETACK", "*"]).encode());

        let deadline = Instant::now() + Duration::from_millis(timeout_milliseconds);

        loop {
            let notified = self.acknowledgement_signal.notified();

            if self.acknowledgements.load(Ordering::SeqCst) >= target_replicas {
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());

            if remaining.is_zero() {
                break;
            }

            if timeout(remaining, notified).await.is_err() {
                break;
            }
        }

        if self.any_write_propagated.load(Ordering::SeqCst) {
            self.acknowledgements.load(Ordering::SeqCst)
        } else {
            self.replica_count().await
        }
    }
}
