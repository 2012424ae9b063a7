//! End-to-end tests that run servers on local ports and talk to them over
//! TCP, the same way a Redis client would.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use redstream::config::Config;
use redstream::resp::{FrameReader, RespValue};
use redstream::server::Server;

struct TestServer {
    port: u16,
    // holds the snapshot directory for the lifetime of the server
    _directory: tempfile::TempDir,
}

impl TestServer {
    async fn start(port: u16, extra_arguments: &[&str]) -> Self {
        let directory = tempfile::tempdir().unwrap();

        let mut arguments = vec![
            String::from("redstream"),
            String::from("--port"),
            port.to_string(),
            String::from("--dir"),
            directory.path().to_str().unwrap().to_string(),
        ];
        arguments.extend(extra_arguments.iter().map(|argument| argument.to_string()));

        let config = Config::from_args(arguments).unwrap();

        tokio::spawn(async move {
            let _ = Server::new(config).run().await;
        });

        for _ in 0..200 {
            if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                return TestServer {
                    port,
                    _directory: directory,
                };
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        panic!("server on port {} did not come up", port);
    }

    async fn start_master(port: u16) -> Self {
        Self::start(port, &[]).await
    }

    async fn start_replica(port: u16, master_port: u16) -> Self {
        let master = format!("127.0.0.1 {}", master_port);
        Self::start(port, &["--replicaof", &master]).await
    }

    async fn client(&self) -> TestClient {
        TestClient::connect(self.port).await
    }
}

struct TestClient {
    frames: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (read_half, write_half) = stream.into_split();

        TestClient {
            frames: FrameReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, parts: &[&str]) {
        self.writer
            .write_all(RespValue::command(parts).encode().as_bytes())
            .await
            .unwrap();
    }

    async fn read_reply(&mut self) -> RespValue {
        self.frames.read_frame().await.unwrap().unwrap()
    }

    async fn roundtrip(&mut self, parts: &[&str]) -> RespValue {
        self.send(parts).await;
        self.read_reply().await
    }
}

fn simple(value: &str) -> RespValue {
    RespValue::SimpleString(value.to_string())
}

fn bulk(value: &str) -> RespValue {
    RespValue::BulkString(value.to_string())
}

#[tokio::test]
async fn ping_echo_and_string_commands() {
    let server = TestServer::start_master(41711).await;
    let mut client = server.client().await;

    assert_eq!(client.roundtrip(&["PING"]).await, simple("PONG"));
    assert_eq!(client.roundtrip(&["ECHO", "hello"]).await, bulk("hello"));

    assert_eq!(
        client.roundtrip(&["SET", "fruit", "apple"]).await,
        simple("OK")
    );
    assert_eq!(client.roundtrip(&["GET", "fruit"]).await, bulk("apple"));
    assert_eq!(
        client.roundtrip(&["GET", "missing"]).await,
        RespValue::NullBulkString
    );

    assert_eq!(
        client.roundtrip(&["INCR", "counter"]).await,
        RespValue::Integer(1)
    );
    assert_eq!(
        client.roundtrip(&["INCR", "counter"]).await,
        RespValue::Integer(2)
    );
    assert_eq!(
        client.roundtrip(&["INCR", "fruit"]).await,
        RespValue::Error(String::from("ERR value is not an integer or out of range"))
    );

    assert_eq!(client.roundtrip(&["TYPE", "fruit"]).await, simple("string"));
    assert_eq!(client.roundtrip(&["TYPE", "missing"]).await, simple("none"));
}

#[tokio::test]
async fn set_with_expiry_stops_serving_the_value() {
    let server = TestServer::start_master(41712).await;
    let mut client = server.client().await;

    assert_eq!(
        client
            .roundtrip(&["SET", "fleeting", "gone", "px", "80"])
            .await,
        simple("OK")
    );
    assert_eq!(client.roundtrip(&["GET", "fleeting"]).await, bulk("gone"));

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(
        client.roundtrip(&["GET", "fleeting"]).await,
        RespValue::NullBulkString
    );
}

#[tokio::test]
async fn unknown_commands_report_errors_without_closing_the_connection() {
    let server = TestServer::start_master(41713).await;
    let mut client = server.client().await;

    assert_eq!(
        client.roundtrip(&["FLUSHALL"]).await,
        RespValue::Error(String::from("ERR Invalid command"))
    );
    assert_eq!(client.roundtrip(&["PING"]).await, simple("PONG"));
}

#[tokio::test]
async fn transactions_queue_and_execute_in_order() {
    let server = TestServer::start_master(41714).await;
    let mut client = server.client().await;

    assert_eq!(
        client.roundtrip(&["EXEC"]).await,
        RespValue::Error(String::from("ERR EXEC without MULTI"))
    );
    assert_eq!(
        client.roundtrip(&["DISCARD"]).await,
        RespValue::Error(String::from("ERR DISCARD without MULTI"))
    );

    assert_eq!(client.roundtrip(&["MULTI"]).await, simple("OK"));
    assert_eq!(
        client.roundtrip(&["SET", "counter", "5"]).await,
        simple("QUEUED")
    );
    assert_eq!(client.roundtrip(&["INCR", "counter"]).await, simple("QUEUED"));
    assert_eq!(client.roundtrip(&["GET", "counter"]).await, simple("QUEUED"));

    assert_eq!(
        client.roundtrip(&["EXEC"]).await,
        RespValue::Array(vec![simple("OK"), RespValue::Integer(6), bulk("6")])
    );

    // empty transaction
    assert_eq!(client.roundtrip(&["MULTI"]).await, simple("OK"));
    assert_eq!(client.roundtrip(&["EXEC"]).await, RespValue::Array(vec![]));

    // discarded commands never run
    assert_eq!(client.roundtrip(&["MULTI"]).await, simple("OK"));
    assert_eq!(
        client.roundtrip(&["SET", "counter", "100"]).await,
        simple("QUEUED")
    );
    assert_eq!(client.roundtrip(&["DISCARD"]).await, simple("OK"));
    assert_eq!(client.roundtrip(&["GET", "counter"]).await, bulk("6"));
}

#[tokio::test]
async fn failed_queued_commands_do_not_abort_the_transaction() {
    let server = TestServer::start_master(41715).await;
    let mut client = server.client().await;

    client.roundtrip(&["SET", "word", "apple"]).await;

    assert_eq!(client.roundtrip(&["MULTI"]).await, simple("OK"));
    assert_eq!(client.roundtrip(&["INCR", "word"]).await, simple("QUEUED"));
    assert_eq!(
        client.roundtrip(&["SET", "fruit", "pear"]).await,
        simple("QUEUED")
    );

    assert_eq!(
        client.roundtrip(&["EXEC"]).await,
        RespValue::Array(vec![
            RespValue::Error(String::from("ERR value is not an integer or out of range")),
            simple("OK"),
        ])
    );
    assert_eq!(client.roundtrip(&["GET", "fruit"]).await, bulk("pear"));
}

#[tokio::test]
async fn streams_support_xadd_xrange_and_xread() {
    let server = TestServer::start_master(41716).await;
    let mut client = server.client().await;

    assert_eq!(
        client
            .roundtrip(&["XADD", "events", "1-1", "temperature", "36"])
            .await,
        bulk("1-1")
    );
    assert_eq!(
        client
            .roundtrip(&["XADD", "events", "1-*", "temperature", "37"])
            .await,
        bulk("1-2")
    );
    assert_eq!(
        client
            .roundtrip(&["XADD", "events", "0-0", "temperature", "38"])
            .await,
        RespValue::Error(String::from(
            "ERR The ID specified in XADD must be greater than 0-0"
        ))
    );
    assert_eq!(
        client
            .roundtrip(&["XADD", "events", "1-1", "temperature", "38"])
            .await,
        RespValue::Error(String::from(
            "ERR The ID specified in XADD is equal or smaller than the target stream top item"
        ))
    );

    assert_eq!(client.roundtrip(&["TYPE", "events"]).await, simple("stream"));

    let expected_entries = RespValue::Array(vec![
        RespValue::Array(vec![
            bulk("1-1"),
            RespValue::Array(vec![bulk("temperature"), bulk("36")]),
        ]),
        RespValue::Array(vec![
            bulk("1-2"),
            RespValue::Array(vec![bulk("temperature"), bulk("37")]),
        ]),
    ]);
    assert_eq!(
        client.roundtrip(&["XRANGE", "events", "-", "+"]).await,
        expected_entries
    );

    assert_eq!(
        client
            .roundtrip(&["XREAD", "streams", "events", "1-1"])
            .await,
        RespValue::Array(vec![RespValue::Array(vec![
            bulk("events"),
            RespValue::Array(vec![RespValue::Array(vec![
                bulk("1-2"),
                RespValue::Array(vec![bulk("temperature"), bulk("37")]),
            ])]),
        ])])
    );
    assert_eq!(
        client
            .roundtrip(&["XREAD", "streams", "events", "1-2"])
            .await,
        RespValue::NullBulkString
    );
}

#[tokio::test]
async fn blocking_xread_wakes_when_another_client_appends() {
    let server = TestServer::start_master(41717).await;
    let mut blocked_client = server.client().await;
    let mut writing_client = server.client().await;

    blocked_client
        .send(&["XREAD", "block", "5000", "streams", "events", "$"])
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        writing_client
            .roundtrip(&["XADD", "events", "7-0", "temperature", "36"])
            .await,
        bulk("7-0")
    );

    let reply = tokio::time::timeout(Duration::from_secs(3), blocked_client.read_reply())
        .await
        .expect("blocked XREAD should wake on XADD");

    assert_eq!(
        reply,
        RespValue::Array(vec![RespValue::Array(vec![
            bulk("events"),
            RespValue::Array(vec![RespValue::Array(vec![
                bulk("7-0"),
                RespValue::Array(vec![bulk("temperature"), bulk("36")]),
            ])]),
        ])])
    );
}

#[tokio::test]
async fn blocking_xread_times_out_with_a_null_reply() {
    let server = TestServer::start_master(41718).await;
    let mut client = server.client().await;

    assert_eq!(
        client
            .roundtrip(&["XREAD", "block", "100", "streams", "events", "$"])
            .await,
        RespValue::NullBulkString
    );
}

#[tokio::test]
async fn info_and_wait_on_a_master_without_replicas() {
    let server = TestServer::start_master(41719).await;
    let mut client = server.client().await;

    let RespValue::BulkString(info) = client.roundtrip(&["INFO", "replication"]).await else {
        panic!("expected a bulk string INFO reply");
    };
    assert!(info.contains("role:master"));
    assert!(info.contains("master_repl_offset:0"));

    assert_eq!(
        client.roundtrip(&["WAIT", "0", "1000"]).await,
        RespValue::Integer(0)
    );
}

#[tokio::test]
async fn config_get_reports_snapshot_location() {
    let server = TestServer::start_master(41720).await;
    let mut client = server.client().await;

    assert_eq!(
        client.roundtrip(&["CONFIG", "GET", "dbfilename"]).await,
        RespValue::Array(vec![bulk("dbfilename"), bulk("dump.rdb")])
    );
}

async fn poll_replica_for_value(
    replica: &TestServer,
    key: &str,
    expected: &str,
) -> bool {
    let mut client = replica.client().await;

    for _ in 0..100 {
        if client.roundtrip(&["GET", key]).await == bulk(expected) {
            return true;
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    false
}

#[tokio::test]
async fn replica_receives_writes_from_its_master() {
    let master = TestServer::start_master(41721).await;
    let replica = TestServer::start_replica(41722, 41721).await;

    // give the handshake a moment to finish
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut replica_client = replica.client().await;
    let RespValue::BulkString(info) = replica_client.roundtrip(&["INFO", "replication"]).await
    else {
        panic!("expected a bulk string INFO reply");
    };
    assert!(info.contains("role:slave"));

    assert_eq!(
        replica_client.roundtrip(&["SET", "fruit", "apple"]).await,
        RespValue::Error(String::from(
            "ERR Replica server only handles read commands from clients"
        ))
    );

    let mut master_client = master.client().await;
    assert_eq!(
        master_client.roundtrip(&["SET", "fruit", "apple"]).await,
        simple("OK")
    );

    assert!(poll_replica_for_value(&replica, "fruit", "apple").await);
}

#[tokio::test]
async fn wait_before_any_write_reports_connected_replicas() {
    let master = TestServer::start_master(41725).await;
    let _replica = TestServer::start_replica(41726, 41725).await;

    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut master_client = master.client().await;

    // nothing was propagated yet, so the connected replica is counted
    // as up to date without waiting for acknowledgements
    assert_eq!(
        master_client.roundtrip(&["WAIT", "1", "500"]).await,
        RespValue::Integer(1)
    );
}

#[tokio::test]
async fn blocking_xread_inside_a_transaction_does_not_block_exec() {
    let server = TestServer::start_master(41727).await;
    let mut client = server.client().await;

    assert_eq!(client.roundtrip(&["MULTI"]).await, simple("OK"));
    assert_eq!(
        client
            .roundtrip(&["XREAD", "block", "0", "streams", "events", "$"])
            .await,
        simple("QUEUED")
    );

    let reply = tokio::time::timeout(Duration::from_secs(2), client.roundtrip(&["EXEC"]))
        .await
        .expect("EXEC must not suspend on a queued blocking XREAD");

    assert_eq!(reply, RespValue::Array(vec![RespValue::NullBulkString]));
}

#[tokio::test]
async fn wait_counts_acknowledging_replicas() {
    let master = TestServer::start_master(41723).await;
    let _replica = TestServer::start_replica(41724, 41723).await;

    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut master_client = master.client().await;
    assert_eq!(
        master_client.roundtrip(&["SET", "fruit", "apple"]).await,
        simple("OK")
    );

    assert_eq!(
        master_client.roundtrip(&["WAIT", "1", "2000"]).await,
        RespValue::Integer(1)
    );
}
