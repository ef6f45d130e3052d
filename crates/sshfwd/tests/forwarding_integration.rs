//! End-to-end forwarding over loopback TCP.
//!
//! `TcpTransport` stands in for the SSH session, so every test drives the
//! real accept loop and relay with real sockets on ephemeral ports.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

use sshfwd::application::listener::{ForwardingListener, ListenerError, ListenerState};
use sshfwd::application::shutdown::{ShutdownCoordinator, ShutdownReason};
use sshfwd::infrastructure::tcp::TcpTransport;
use sshfwd_core::{Direction, ForwardRule};

const STEP: Duration = Duration::from_secs(5);

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Starts a server that echoes every connection back to itself.
async fn spawn_echo_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.into_split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    address
}

/// Starts a listener whose accepted sockets are handed to the test.
async fn spawn_capture_server() -> (String, tokio::sync::mpsc::Receiver<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (tx, rx) = tokio::sync::mpsc::channel(16);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if tx.send(stream).await.is_err() {
                break;
            }
        }
    });
    (address, rx)
}

struct Running {
    address: String,
    shutdown: ShutdownCoordinator,
    task: JoinHandle<Result<(), ListenerError>>,
}

/// Runs a listener for `rule` over `TcpTransport` and waits until it is
/// accepting.
async fn start(rule: ForwardRule) -> Running {
    let shutdown = ShutdownCoordinator::new();
    let listener = ForwardingListener::new(rule, Arc::new(TcpTransport::new()), shutdown.clone());
    let mut state = listener.state();
    let task = tokio::spawn(listener.run());
    let address = listening_address(&mut state).await;
    Running {
        address,
        shutdown,
        task,
    }
}

async fn listening_address(state: &mut watch::Receiver<ListenerState>) -> String {
    let current = tokio::time::timeout(
        STEP,
        state.wait_for(|s| !matches!(s, ListenerState::Starting)),
    )
    .await
    .expect("listener must start")
    .expect("state channel open")
    .clone();
    match current {
        ListenerState::Listening { address } => address,
        other => panic!("listener did not start: {other:?}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_local_to_remote_ping_pong() {
    // Arrange: a server that answers PING with PONG.
    let (server_address, mut accepted) = spawn_capture_server().await;
    let rule = ForwardRule::new("127.0.0.1:0", &server_address, Direction::LocalToRemote).unwrap();
    let running = start(rule).await;

    // Act
    let mut client = TcpStream::connect(&running.address).await.unwrap();
    client.write_all(b"PING").await.unwrap();

    let mut server = tokio::time::timeout(STEP, accepted.recv()).await.unwrap().unwrap();
    let mut request = [0u8; 4];
    server.read_exact(&mut request).await.unwrap();
    server.write_all(b"PONG").await.unwrap();

    let mut reply = [0u8; 4];
    tokio::time::timeout(STEP, client.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(&request, b"PING");
    assert_eq!(&reply, b"PONG");

    running.shutdown.fire(ShutdownReason::Requested);
    assert_ok!(running.task.await.unwrap());
}

#[tokio::test]
async fn test_client_close_reaches_the_server() {
    // Arrange
    let (server_address, mut accepted) = spawn_capture_server().await;
    let rule = ForwardRule::new("127.0.0.1:0", &server_address, Direction::LocalToRemote).unwrap();
    let running = start(rule).await;
    let client = TcpStream::connect(&running.address).await.unwrap();
    let mut server = tokio::time::timeout(STEP, accepted.recv()).await.unwrap().unwrap();

    // Act
    drop(client);

    // Assert: the server observes end-of-stream.
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(STEP, server.read(&mut buf))
        .await
        .expect("close must propagate")
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_server_close_reaches_the_client() {
    let (server_address, mut accepted) = spawn_capture_server().await;
    let rule = ForwardRule::new("127.0.0.1:0", &server_address, Direction::LocalToRemote).unwrap();
    let running = start(rule).await;
    let mut client = TcpStream::connect(&running.address).await.unwrap();
    let server = tokio::time::timeout(STEP, accepted.recv()).await.unwrap().unwrap();

    drop(server);

    let mut rest = Vec::new();
    tokio::time::timeout(STEP, client.read_to_end(&mut rest))
        .await
        .expect("close must propagate")
        .unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_large_payload_round_trips_through_echo_server() {
    // Arrange
    let echo = spawn_echo_server().await;
    let rule = ForwardRule::new("127.0.0.1:0", &echo, Direction::LocalToRemote).unwrap();
    let running = start(rule).await;
    let payload: Vec<u8> = (0..1024 * 1024u32).map(|i| (i * 7 % 256) as u8).collect();

    // Act: write and read concurrently so neither side's buffers fill up.
    // The writer stays open until the echo is back, since closing either
    // end closes the whole forward.
    let client = TcpStream::connect(&running.address).await.unwrap();
    let (mut reader, mut writer) = client.into_split();
    let outgoing = payload.clone();
    let write_task = tokio::spawn(async move {
        writer.write_all(&outgoing).await.unwrap();
        writer
    });
    let mut echoed = vec![0u8; payload.len()];
    tokio::time::timeout(Duration::from_secs(20), reader.read_exact(&mut echoed))
        .await
        .expect("echo must complete")
        .unwrap();
    drop(write_task.await.unwrap());

    // Assert
    assert_eq!(echoed.len(), payload.len());
    assert!(echoed == payload, "payload corrupted in transit");
}

#[tokio::test]
async fn test_concurrent_connections_are_independent() {
    // Arrange
    let echo = spawn_echo_server().await;
    let rule = ForwardRule::new("127.0.0.1:0", &echo, Direction::LocalToRemote).unwrap();
    let running = start(rule).await;

    // Act
    let mut clients = Vec::new();
    for i in 0..8u8 {
        let address = running.address.clone();
        clients.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(&address).await.unwrap();
            let message = [i; 32];
            stream.write_all(&message).await.unwrap();
            let mut back = [0u8; 32];
            stream.read_exact(&mut back).await.unwrap();
            back == message
        }));
    }

    // Assert
    for client in clients {
        let ok = tokio::time::timeout(STEP, client).await.unwrap().unwrap();
        assert!(ok);
    }
}

#[tokio::test]
async fn test_remote_to_local_relays_to_the_local_service() {
    // Arrange: with TcpTransport the "remote" listener is a loopback socket.
    let echo = spawn_echo_server().await;
    let rule = ForwardRule::new(&echo, "127.0.0.1:0", Direction::RemoteToLocal).unwrap();
    let running = start(rule).await;

    // Act
    let mut client = TcpStream::connect(&running.address).await.unwrap();
    client.write_all(b"over the tunnel").await.unwrap();
    let mut back = [0u8; 15];
    tokio::time::timeout(STEP, client.read_exact(&mut back))
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(&back, b"over the tunnel");
}

#[tokio::test]
async fn test_unreachable_target_closes_client_but_keeps_listening() {
    // Arrange: a target port with nothing behind it.
    let dead = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().to_string()
    };
    let rule = ForwardRule::new("127.0.0.1:0", &dead, Direction::LocalToRemote).unwrap();
    let running = start(rule).await;

    // Act / Assert: each client is closed, the listener stays up.
    for _ in 0..3 {
        let mut client = TcpStream::connect(&running.address).await.unwrap();
        let mut rest = Vec::new();
        let _ = tokio::time::timeout(STEP, client.read_to_end(&mut rest))
            .await
            .expect("client must be closed");
        assert!(rest.is_empty());
    }
    assert!(!running.shutdown.is_fired());
    assert!(!running.task.is_finished());
}

#[tokio::test]
async fn test_in_flight_relay_survives_shutdown() {
    // Arrange
    let echo = spawn_echo_server().await;
    let rule = ForwardRule::new("127.0.0.1:0", &echo, Direction::LocalToRemote).unwrap();
    let running = start(rule).await;
    let mut client = TcpStream::connect(&running.address).await.unwrap();
    client.write_all(b"before").await.unwrap();
    let mut buf = [0u8; 6];
    client.read_exact(&mut buf).await.unwrap();

    // Act: stop the listener while the connection is open.
    running.shutdown.fire(ShutdownReason::Requested);
    assert_ok!(tokio::time::timeout(STEP, running.task).await.unwrap().unwrap());

    // Assert: the existing relay still works...
    client.write_all(b"after!").await.unwrap();
    tokio::time::timeout(STEP, client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"after!");

    // ...but nobody accepts new connections any more.
    assert!(TcpStream::connect(&running.address).await.is_err());
}
