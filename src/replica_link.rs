//! Replica side of replication: the handshake with the master and the
//! loop that applies the propagated command stream.

use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::commands::{Command, ReplconfDirective};
use crate::engine::Engine;
use crate::resp::{FrameReader, RespError, RespValue};

#[derive(Error, Debug, PartialEq)]
pub enum ReplicaLinkError {
    #[error("Failed to connect to master: {0}")]
    Connect(String),
    #[error("Failed to send command to master: {0}")]
    Send(String),
    #[error(transparent)]
    Resp(#[from] RespError),
    #[error("Unexpected response from master: {0}")]
    UnexpectedMasterReply(String),
}

fn is_valid_replication_id(id: &str) -> bool {
    id.len() == 40 && id.chars().all(|character| character.is_ascii_alphanumeric())
}

async fn send_command(
    writer: &mut OwnedWriteHalf,
    parts: &[&str],
) -> Result<(), ReplicaLinkError> {
    writer
        .write_all(RespValue::command(parts).encode().as_bytes())
        .await
        .map_err(|error| ReplicaLinkError::Send(error.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|error| ReplicaLinkError::Send(error.to_string()))
}

async fn expect_simple_string<R>(
    frames: &mut FrameReader<R>,
    expected: &str,
) -> Result<(), ReplicaLinkError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match frames.read_frame().await? {
        Some(RespValue::SimpleString(value)) if value == expected => Ok(()),
        other => Err(ReplicaLinkError::UnexpectedMasterReply(format!(
            "{:?}",
            other
        ))),
    }
}

/// PING, REPLCONF listening-port, REPLCONF capa, PSYNC, then the
/// full-resync marker and the snapshot payload.
async fn handshake<R>(
    frames: &mut FrameReader<R>,
    writer: &mut OwnedWriteHalf,
    listening_port: u16,
) -> Result<(), ReplicaLinkError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    send_command(writer, &["PING"]).await?;
    expect_simple_string(frames, "PONG").await?;

    send_command(
        writer,
        &["REPLCONF", "listening-port", &listening_port.to_string()],
    )
    .await?;
    expect_simple_string(frames, "OK").await?;

    send_command(writer, &["REPLCONF", "capa", "psync2"]).await?;
    expect_simple_string(frames, "OK").await?;

    send_command(writer, &["PSYNC", "?", "-1"]).await?;

    let marker = frames.read_line().await?;
    let parts: Vec<&str> = marker
        .strip_prefix('+')
        .unwrap_or(&marker)
        .split_whitespace()
        .collect();

    match parts.as_slice() {
        ["FULLRESYNC", replication_id, _offset] if is_valid_replication_id(replication_id) => {}
        _ => return Err(ReplicaLinkError::UnexpectedMasterReply(marker)),
    }

    // the snapshot is read off the wire but the keyspace starts empty
    let snapshot = frames.read_payload().await?;
    debug!(bytes = snapshot.len(), "received snapshot from master");

    Ok(())
}

/// Connects to the master and applies its command stream until the
/// connection drops.
///
/// The replica offset advances by the canonical encoded length of every
/// SET, PING and REPLCONF GETACK received. A GETACK is answered with the
/// offset as it stood before the probe itself is counted.
pub async fn run_replica_link(
    engine: Arc<Engine>,
    master_host: &str,
    master_port: u16,
) -> Result<(), ReplicaLinkError> {
    let stream = TcpStream::connect((master_host, master_port))
        .await
        .map_err(|error| ReplicaLinkError::Connect(error.to_string()))?;
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FrameReader::new(read_half);

    handshake(&mut frames, &mut write_half, engine.config.port).await?;
    info!(master = %format!("{}:{}", master_host, master_port), "replication handshake complete");

    loop {
        let Some(frame) = frames.read_frame().await? else {
            info!("master closed the replication link");
            return Ok(());
        };

        let frame_length = frame.encode().len() as u64;

        let command = match Command::parse(frame) {
            Ok(command) => command,
            Err(error) => {
                debug!(error = %error, "ignoring unparsable command from master");
                continue;
            }
        };

        match command {
            Command::Set(arguments) => {
                engine.apply_replicated_set(arguments).await;
                engine.replication.add_offset(frame_length);
            }
            Command::Ping => {
                engine.replication.add_offset(frame_length);
            }
            Command::Replconf(arguments)
                if arguments.directive == ReplconfDirective::GetAck =>
            {
                let acknowledgement = RespValue::command(&[
                    "REPLCONF",
                    "ACK",
                    &engine.replication.offset().to_string(),
                ]);

                write_half
                    .write_all(acknowledgement.encode().as_bytes())
                    .await
                    .map_err(|error| ReplicaLinkError::Send(error.to_string()))?;
                write_half
                    .flush()
                    .await
                    .map_err(|error| ReplicaLinkError::Send(error.to_string()))?;

                engine.replication.add_offset(frame_length);
            }
            other => {
                debug!(command = ?other, "ignoring command from master");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_replication_id() {
        assert!(is_valid_replication_id(
            "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb"
        ));
        assert!(!is_valid_replication_id("too-short"));
        assert!(!is_valid_replication_id(
            "8371b4fb1155b71f4a04d3e1bc3e18c4a990aee!"
        ));
        assert!(!is_valid_replication_id(""));
    }

    #[tokio::test]
    async fn handshake_against_a_scripted_master() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let master = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut frames = FrameReader::new(read_half);

            assert_eq!(
                frames.read_frame().await.unwrap(),
                Some(RespValue::command(&["PING"]))
            );
            write_half.write_all(b"+PONG\r\n").await.unwrap();

            assert_eq!(
                frames.read_frame().await.unwrap(),
                Some(RespValue::command(&["REPLCONF", "listening-port", "6380"]))
            );
            write_half.write_all(b"+OK\r\n").await.unwrap();

            assert_eq!(
                frames.read_frame().await.unwrap(),
                Some(RespValue::command(&["REPLCONF", "capa", "psync2"]))
            );
            write_half.write_all(b"+OK\r\n").await.unwrap();

            assert_eq!(
                frames.read_frame().await.unwrap(),
                Some(RespValue::command(&["PSYNC", "?", "-1"]))
            );
            write_half
                .write_all(
                    b"+FULLRESYNC 8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb 0\r\n$5\r\nREDIS",
                )
                .await
                .unwrap();
        });

        let stream = TcpStream::connect(address).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut frames = FrameReader::new(read_half);

        handshake(&mut frames, &mut write_half, 6380).await.unwrap();
        master.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_rejects_a_malformed_fullresync_marker() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut frames = FrameReader::new(read_half);

            for reply in ["+PONG\r\n", "+OK\r\n", "+OK\r\n"] {
                frames.read_frame().await.unwrap();
                write_half.write_all(reply.as_bytes()).await.unwrap();
            }

            frames.read_frame().await.unwrap();
            write_half
                .write_all(b"+FULLRESYNC not-a-valid-id 0\r\n")
                .await
                .unwrap();
        });

        let stream = TcpStream::connect(address).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut frames = FrameReader::new(read_half);

        assert!(matches!(
            handshake(&mut frames, &mut write_half, 6380).await,
            Err(ReplicaLinkError::UnexpectedMasterReply(_))
        ));
    }
}
