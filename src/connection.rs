//! Per-client connection loop.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::commands::{Command, CommandError};
use crate::engine::{CommandResult, Engine};
use crate::resp::{FrameReader, RespValue};
use crate::snapshot;
use crate::transaction::TransactionState;

async fn write_bytes(
    writer: &Arc<Mutex<OwnedWriteHalf>>,
    bytes: &[u8],
) -> Result<(), std::io::Error> {
    let mut writer = writer.lock().await;
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Reads frames off the socket until the client disconnects. The write
/// half is shared behind a mutex because a PSYNC turns it into a replica
/// session that the propagation path writes to concurrently.
pub async fn handle_client_connection(stream: TcpStream, engine: Arc<Engine>) {
    let peer_address = match stream.peer_addr() {
        Ok(address) => address.to_string(),
        Err(error) => {
            debug!(error = %error, "could not resolve peer address");
            return;
        }
    };

    let (read_half, write_half) = stream.into_split();
    let mut frames = FrameReader::new(read_half);
    let writer = Arc::new(Mutex::new(write_half));
    let mut transaction = TransactionState::default();

    loop {
        let frame = match frames.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(error) => {
                debug!(peer = %peer_address, error = %error, "closing connection");
                break;
            }
        };

        let command = match Command::parse(frame) {
            Ok(command) => command,
            Err(error) => {
                if write_bytes(&writer, error.as_resp().encode().as_bytes())
                    .await
                    .is_err()
                {
                    break;
                }

                continue;
            }
        };

        // MULTI, EXEC and DISCARD control the queue and are never queued
        // themselves
        if transaction.is_queuing()
            && !matches!(command, Command::Multi | Command::Exec | Command::Discard)
        {
            transaction.enqueue(command);

            if write_bytes(&writer, b"+QUEUED\r\n").await.is_err() {
                break;
            }

            continue;
        }

        let reply_bytes = match command {
            Command::Multi => {
                transaction.begin();
                RespValue::SimpleString(String::from("OK")).encode().into_bytes()
            }
            Command::Exec => match transaction.take() {
                None => CommandError::ExecWithoutMulti.as_resp().encode().into_bytes(),
                Some(queued) => {
                    let mut replies = Vec::with_capacity(queued.len());

                    for mut queued_command in queued {
                        // a queued XREAD must not suspend the whole
                        // transaction, so BLOCK degrades to an
                        // immediate read
                        if let Command::Xread(ref mut arguments) = queued_command {
                            arguments.block_milliseconds = None;
                        }

                        let reply = match engine.execute(queued_command, &peer_address).await {
                            Ok(CommandResult::Response(value)) => value,
                            Ok(_) => RespValue::Error(String::from(
                                "ERR command not allowed inside MULTI",
                            )),
                            Err(error) => error.as_resp(),
                        };

                        replies.push(reply);
                    }

                    RespValue::Array(replies).encode().into_bytes()
                }
            },
            Command::Discard => {
                if transaction.discard() {
                    RespValue::SimpleString(String::from("OK")).encode().into_bytes()
                } else {
                    CommandError::DiscardWithoutMulti.as_resp().encode().into_bytes()
                }
            }
            other => match engine.execute(other, &peer_address).await {
                Ok(CommandResult::NoResponse) => continue,
                Ok(CommandResult::Response(value)) => value.encode().into_bytes(),
                Ok(CommandResult::Sync(marker)) => {
                    // full-resync marker, then the length-prefixed snapshot
                    // with no trailing CRLF
                    let payload = snapshot::empty_snapshot();
                    let mut bytes = marker.encode().into_bytes();
                    bytes.extend_from_slice(format!("${}\r\n", payload.len()).as_bytes());
                    bytes.extend_from_slice(&payload);

                    if write_bytes(&writer, &bytes).await.is_err() {
                        break;
                    }

                    engine
                        .replication
                        .register_replica(&peer_address, Arc::clone(&writer))
                        .await;

                    continue;
                }
                Err(error) => error.as_resp().encode().into_bytes(),
            },
        };

        if write_bytes(&writer, &reply_bytes).await.is_err() {
            break;
        }
    }

    engine.replication.remove_replica(&peer_address).await;
    debug!(peer = %peer_address, "connection closed");
}
