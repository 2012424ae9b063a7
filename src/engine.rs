//! Command execution. All keyspace mutations and replica bookkeeping go
//! through [`Engine::execute`], so connection handlers stay thin.

use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Instant};

use crate::commands::{
    Command, CommandError, ConfigGetArguments, ConfigParameter, GetArguments, IncrArguments,
    PsyncArguments, ReplconfArguments, ReplconfDirective, SetArguments, TypeArguments,
    WaitArguments, XaddArguments, XrangeArguments, XreadArguments,
};
use crate::config::Config;
use crate::replication::{ReplicationState, Role};
use crate::resp::RespValue;
use crate::snapshot::SnapshotReader;
use crate::state::StreamSignals;
use crate::store::{now_milliseconds, Store};
use crate::stream::{self, StreamEntry, StreamId};

/// What the connection loop should do with the outcome of a command.
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Nothing goes back on the wire, used for replica acknowledgements.
    NoResponse,
    Response(RespValue),
    /// The reply starts a full resync: the connection sends it, follows up
    /// with the snapshot payload and registers the peer as a replica.
    Sync(RespValue),
}

#[derive(Debug)]
pub struct Engine {
    pub config: Config,
    pub store: Mutex<Store>,
    pub signals: Mutex<StreamSignals>,
    pub replication: ReplicationState,
    pub snapshot: SnapshotReader,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let role = match &config.replica_of {
            Some((master_host, master_port)) => Role::Replica {
                master_host: master_host.clone(),
                master_port: *master_port,
            },
            None => Role::Master,
        };
        let snapshot = SnapshotReader::new(&config.directory, &config.db_filename);

        Engine {
            config,
            store: Mutex::new(Store::new()),
            signals: Mutex::new(StreamSignals::default()),
            replication: ReplicationState::new(role),
            snapshot,
        }
    }

    pub async fn execute(
        &self,
        command: Command,
        client_address: &str,
    ) -> Result<CommandResult, CommandError> {
        if self.replication.role.is_replica() && command.is_write() {
            return Err(CommandError::ReadOnlyReplica);
        }

        match command {
            Command::Ping => Ok(CommandResult::Response(RespValue::SimpleString(
                String::from("PONG"),
            ))),
            Command::Echo(arguments) => Ok(CommandResult::Response(RespValue::BulkString(
                arguments.message,
            ))),
            Command::Set(arguments) => self.execute_set(arguments).await,
            Command::Get(arguments) => self.execute_get(arguments).await,
            Command::Incr(arguments) => self.execute_incr(arguments).await,
            Command::Type(arguments) => self.execute_type(arguments).await,
            Command::Keys(_) => self.execute_keys(),
            Command::ConfigGet(arguments) => self.execute_config_get(arguments),
            Command::Info(_) => self.execute_info(),
            Command::Xadd(arguments) => self.execute_xadd(arguments).await,
            Command::Xrange(arguments) => self.execute_xrange(arguments).await,
            Command::Xread(arguments) => self.execute_xread(arguments, client_address).await,
            Command::Replconf(arguments) => self.execute_replconf(arguments, client_address).await,
            Command::Psync(arguments) => self.execute_psync(arguments),
            Command::Wait(arguments) => self.execute_wait(arguments).await,
            // handled by the connection loop's transaction gate
            Command::Multi | Command::Exec | Command::Discard => Err(CommandError::InvalidCommand),
        }
    }

    async fn execute_set(&self, arguments: SetArguments) -> Result<CommandResult, CommandError> {
        let mut store = self.store.lock().await;
        store.set(
            arguments.key.clone(),
            arguments.value.clone(),
            arguments.time_to_live_milliseconds,
        );

        // queued while the store lock is held, so the wire order to
        // replicas matches the order writes landed in the store
        if !self.replication.role.is_replica() {
            self.replication
                .propagate_set(&arguments.key, &arguments.value);
        }

        Ok(CommandResult::Response(RespValue::SimpleString(
            String::from("OK"),
        )))
    }

    async fn execute_get(&self, arguments: GetArguments) -> Result<CommandResult, CommandError> {
        // snapshot records win over the live store when still valid
        if let Some(value) = self
            .snapshot
            .read_valid_value(&arguments.key, now_milliseconds())
        {
            return Ok(CommandResult::Response(RespValue::BulkString(value)));
        }

        let value = self.store.lock().await.get(&arguments.key);

        Ok(CommandResult::Response(match value {
            Some(value) => RespValue::BulkString(value),
            None => RespValue::NullBulkString,
        }))
    }

    async fn execute_incr(&self, arguments: IncrArguments) -> Result<CommandResult, CommandError> {
        let incremented = self
            .store
            .lock()
            .await
            .increment(&arguments.key)
            .map_err(|_| CommandError::NotAnInteger)?;

        Ok(CommandResult::Response(RespValue::Integer(incremented)))
    }

    async fn execute_type(&self, arguments: TypeArguments) -> Result<CommandResult, CommandError> {
        let kind = self.store.lock().await.kind(&arguments.key).unwrap_or("none");

        Ok(CommandResult::Response(RespValue::SimpleString(
            kind.to_string(),
        )))
    }

    fn execute_keys(&self) -> Result<CommandResult, CommandError> {
        let keys = self
            .snapshot
            .read_records()
            .into_iter()
            .map(|record| RespValue::BulkString(record.key))
            .collect();

        Ok(CommandResult::Response(RespValue::Array(keys)))
    }

    fn execute_config_get(
        &self,
        arguments: ConfigGetArguments,
    ) -> Result<CommandResult, CommandError> {
        let value = match arguments.parameter {
            ConfigParameter::Dir => self.config.directory.clone(),
            ConfigParameter::DbFilename => self.config.db_filename.clone(),
        };

        Ok(CommandResult::Response(RespValue::Array(vec![
            RespValue::BulkString(arguments.parameter.name().to_string()),
            RespValue::BulkString(value),
        ])))
    }

    fn execute_info(&self) -> Result<CommandResult, CommandError> {
        let body = format!(
            "role:{}\r\nmaster_replid:{}\r\nmaster_repl_offset:{}",
            self.replication.role.name(),
            self.replication.replication_id,
            self.replication.offset()
        );

        Ok(CommandResult::Response(RespValue::BulkString(body)))
    }

    async fn execute_xadd(&self, arguments: XaddArguments) -> Result<CommandResult, CommandError> {
        let id = {
            let mut store = self.store.lock().await;
            let top = store
                .last_stream_id(&arguments.key)
                .map_err(|_| CommandError::InvalidDataTypeForKey)?;
            let id = arguments.requested_id.resolve(top, now_milliseconds())?;

            store
                .append_stream_entry(
                    &arguments.key,
                    StreamEntry {
                        id,
                        fields: arguments.fields,
                    },
                )
                .map_err(|_| CommandError::InvalidDataTypeForKey)?;

            id
        };

        self.signals.lock().await.notify(&arguments.key);

        Ok(CommandResult::Response(RespValue::BulkString(
            id.to_string(),
        )))
    }

    async fn execute_xrange(
        &self,
        arguments: XrangeArguments,
    ) -> Result<CommandResult, CommandError> {
        let store = self.store.lock().await;
        let entries = match store
            .stream_entries(&arguments.key)
            .map_err(|_| CommandError::InvalidDataTypeForKey)?
        {
            Some(entries) => stream::entries_in_range(entries, arguments.start, arguments.end),
            None => Vec::new(),
        };

        Ok(CommandResult::Response(stream::entries_to_resp(&entries)))
    }

    /// Resolves the raw XREAD IDs once, at call time. `$` pins to the
    /// stream's current top entry so only later writes count as new.
    async fn resolve_read_targets(
        &self,
        streams: &[(String, String)],
    ) -> Result<Vec<(String, StreamId)>, CommandError> {
        let store = self.store.lock().await;
        let mut targets = Vec::with_capacity(streams.len());

        for (key, raw_id) in streams {
            let after = if raw_id == "$" {
                store
                    .last_stream_id(key)
                    .map_err(|_| CommandError::InvalidDataTypeForKey)?
                    .unwrap_or(StreamId::MIN)
            } else {
                stream::parse_range_start(raw_id)?
            };

            targets.push((key.clone(), after));
        }

        Ok(targets)
    }

    async fn collect_new_entries(
        &self,
        targets: &[(String, StreamId)],
    ) -> Result<Vec<(String, Vec<StreamEntry>)>, CommandError> {
        let store = self.store.lock().await;
        let mut results = Vec::new();

        for (key, after) in targets {
            if let Some(entries) = store
                .stream_entries(key)
                .map_err(|_| CommandError::InvalidDataTypeForKey)?
            {
                let new_entries = stream::entries_after(entries, *after);

                if !new_entries.is_empty() {
                    results.push((key.clone(), new_entries));
                }
            }
        }

        Ok(results)
    }

    fn read_reply(results: Vec<(String, Vec<StreamEntry>)>) -> RespValue {
        if results.is_empty() {
            return RespValue::NullBulkString;
        }

        RespValue::Array(
            results
                .into_iter()
                .map(|(key, entries)| {
                    RespValue::Array(vec![
                        RespValue::BulkString(key),
                        stream::entries_to_resp(&entries),
                    ])
                })
                .collect(),
        )
    }

    async fn unsubscribe_targets(&self, targets: &[(String, StreamId)], client_address: &str) {
        let mut signals = self.signals.lock().await;

        for (key, _) in targets {
            signals.unsubscribe(key, client_address);
        }
    }

    async fn execute_xread(
        &self,
        arguments: XreadArguments,
        client_address: &str,
    ) -> Result<CommandResult, CommandError> {
        let targets = self.resolve_read_targets(&arguments.streams).await?;
        let results = self.collect_new_entries(&targets).await?;

        if !results.is_empty() {
            return Ok(CommandResult::Response(Self::read_reply(results)));
        }

        let Some(block_milliseconds) = arguments.block_milliseconds else {
            return Ok(CommandResult::Response(RespValue::NullBulkString));
        };

        let (sender, mut receiver) = mpsc::channel(16);

        {
            let mut signals = self.signals.lock().await;

            for (key, _) in &targets {
                signals.subscribe(key, client_address, sender.clone());
            }
        }

        // BLOCK 0 waits until data arrives
        let deadline =
            (block_milliseconds > 0).then(|| Instant::now() + Duration::from_millis(block_milliseconds));

        let reply = loop {
            // re-check after subscribing so a concurrent XADD is not missed
            let results = match self.collect_new_entries(&targets).await {
                Ok(results) => results,
                Err(error) => {
                    self.unsubscribe_targets(&targets, client_address).await;
                    return Err(error);
                }
            };

            if !results.is_empty() {
                break Self::read_reply(results);
            }

            match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());

                    if remaining.is_zero() {
                        break RespValue::NullBulkString;
                    }

                    if timeout(remaining, receiver.recv()).await.is_err() {
                        break RespValue::NullBulkString;
                    }
                }
                None => {
                    if receiver.recv().await.is_none() {
                        break RespValue::NullBulkString;
                    }
                }
            }
        };

        self.unsubscribe_targets(&targets, client_address).await;

        Ok(CommandResult::Response(reply))
    }

    async fn execute_replconf(
        &self,
        arguments: ReplconfArguments,
        client_address: &str,
    ) -> Result<CommandResult, CommandError> {
        match arguments.directive {
            ReplconfDirective::ListeningPort(_) | ReplconfDirective::Capabilities => Ok(
                CommandResult::Response(RespValue::SimpleString(String::from("OK"))),
            ),
            ReplconfDirective::Ack(offset) => {
                self.replication
                    .record_acknowledgement(client_address, offset)
                    .await;

                Ok(CommandResult::NoResponse)
            }
            ReplconfDirective::GetAck => Ok(CommandResult::Response(RespValue::command(&[
                "REPLCONF",
                "ACK",
                &self.replication.offset().to_string(),
            ]))),
        }
    }

    fn execute_psync(&self, arguments: PsyncArguments) -> Result<CommandResult, CommandError> {
        if self.replication.role.is_replica() {
            return Err(CommandError::PsyncOnReplica);
        }

        if arguments.replication_id != "?"
            && arguments.replication_id != self.replication.replication_id
        {
            return Err(CommandError::InvalidPsyncReplicationId);
        }

        Ok(CommandResult::Sync(RespValue::SimpleString(format!(
            "FULLRESYNC {} {}",
            self.replication.replication_id,
            self.replication.offset()
        ))))
    }

    async fn execute_wait(&self, arguments: WaitArguments) -> Result<CommandResult, CommandError> {
        if self.replication.role.is_replica() {
            return Err(CommandError::WaitOnReplica);
        }

        if arguments.target_replicas == 0 {
            return Ok(CommandResult::Response(RespValue::Integer(0)));
        }

        let acknowledged = self
            .replication
            .wait_for_acknowledgements(arguments.target_replicas, arguments.timeout_milliseconds)
            .await;

        Ok(CommandResult::Response(RespValue::Integer(
            acknowledged as i64,
        )))
    }

    /// Applies a write received over the replication link, bypassing the
    /// client-facing read-only gate.
    pub async fn apply_replicated_set(&self, arguments: SetArguments) {
        self.store.lock().await.set(
            arguments.key,
            arguments.value,
            arguments.time_to_live_milliseconds,
        );
    }
}
