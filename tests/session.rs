//! End-to-end tests for the primary RCON session against in-process mock servers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use gamercon::config::RconConfig;
use gamercon::core::codec::PacketCodec;
use gamercon::core::packet::{Packet, PacketKind, TERMINATOR};
use gamercon::error::ProtocolError;
use gamercon::protocol::encoding::CommandEncoding;
use gamercon::protocol::request_id::SequentialIds;
use gamercon::protocol::session::{RconClient, SessionState};
use gamercon::utils::metrics::Metrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::sleep;
use tokio_util::codec::Framed;

const PASSWORD: &str = "correct horse";

type ServerConn = Framed<TcpStream, PacketCodec>;

/// Accept a single connection and hand it to `handler`
async fn spawn_server<F, Fut>(handler: F) -> u16
where
    F: FnOnce(ServerConn) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            handler(Framed::new(stream, PacketCodec::new())).await;
        }
    });
    port
}

/// Answer the auth request: echo its id on success, -1 on a wrong password
async fn answer_auth(conn: &mut ServerConn) -> bool {
    let request = conn.next().await.unwrap().unwrap();
    assert_eq!(request.kind(), PacketKind::Auth);
    let accepted = request.payload() == PASSWORD.as_bytes();
    let id = if accepted { request.id() } else { -1 };
    conn.send(Packet::new(id, PacketKind::AuthResponse, Vec::new()).unwrap())
        .await
        .unwrap();
    accepted
}

/// Hold the connection open until the client goes away
async fn drain(conn: &mut ServerConn) {
    while let Some(Ok(_)) = conn.next().await {}
}

fn client_for(port: u16, password: &str) -> RconClient {
    let config =
        RconConfig::new("127.0.0.1", port, password).with_timeout(Duration::from_secs(2));
    RconClient::new(config).with_request_ids(SequentialIds::new())
}

#[tokio::test]
async fn test_list_players_round_trip() {
    let (seen_tx, seen_rx) = oneshot::channel();
    let port = spawn_server(|mut conn| async move {
        assert!(answer_auth(&mut conn).await);
        let command = conn.next().await.unwrap().unwrap();
        let reply = Packet::new(command.id(), PacketKind::ResponseValue, "no players online")
            .unwrap();
        let _ = seen_tx.send((command.id(), command.kind(), command.text().into_owned()));
        conn.send(reply).await.unwrap();
        drain(&mut conn).await;
    })
    .await;

    let mut client = client_for(port, PASSWORD);
    client.connect().await.unwrap();
    assert_eq!(client.state(), SessionState::Authenticated);

    let reply = client.execute_raw("ListPlayers").await.unwrap();
    assert_eq!(reply.text(), "no players online");

    let (sent_id, sent_kind, sent_text) = seen_rx.await.unwrap();
    assert_eq!(sent_kind, PacketKind::Command);
    assert_eq!(sent_text, "ListPlayers");
    assert_eq!(reply.id(), sent_id);

    client.close().await;
}

#[tokio::test]
async fn test_free_connect_and_execute() {
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        while let Some(Ok(command)) = conn.next().await {
            let text = format!("ran {}", command.text());
            conn.send(Packet::new(command.id(), PacketKind::ResponseValue, text).unwrap())
                .await
                .unwrap();
        }
    })
    .await;

    let mut client = gamercon::connect("127.0.0.1", port, PASSWORD, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(client.execute("save").await.unwrap(), "ran save");
    assert_eq!(client.execute("kick bob").await.unwrap(), "ran kick bob");
    client.close().await;
}

#[tokio::test]
async fn test_base64_encoding_round_trip_and_fallback() {
    let (seen_tx, seen_rx) = oneshot::channel();
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let mut seen = Vec::new();

        // Encoded reply
        let command = conn.next().await.unwrap().unwrap();
        seen.push(command.text().into_owned());
        let decoded = STANDARD.decode(command.payload()).unwrap();
        let mut output = b"ran ".to_vec();
        output.extend_from_slice(&decoded);
        let reply = Packet::new(command.id(), PacketKind::ResponseValue, STANDARD.encode(output));
        conn.send(reply.unwrap()).await.unwrap();

        // Reply the server did not encode
        let command = conn.next().await.unwrap().unwrap();
        seen.push(command.text().into_owned());
        let reply = Packet::new(command.id(), PacketKind::ResponseValue, "Unknown command");
        conn.send(reply.unwrap()).await.unwrap();

        let _ = seen_tx.send(seen);
        drain(&mut conn).await;
    })
    .await;

    let config = RconConfig::new("127.0.0.1", port, PASSWORD)
        .with_timeout(Duration::from_secs(2))
        .with_encoding(CommandEncoding::Base64);
    let mut client = RconClient::new(config);
    client.connect().await.unwrap();

    assert_eq!(client.execute("kick bob").await.unwrap(), "ran kick bob");
    assert_eq!(client.execute("bogus").await.unwrap(), "Unknown command");
    assert_eq!(
        seen_rx.await.unwrap(),
        vec![STANDARD.encode("kick bob"), STANDARD.encode("bogus")]
    );
}

#[tokio::test]
async fn test_sequential_ids_reach_the_wire() {
    let (ids_tx, ids_rx) = oneshot::channel();
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let command = conn.next().await.unwrap().unwrap();
            ids.push(command.id());
            conn.send(Packet::new(command.id(), PacketKind::ResponseValue, "").unwrap())
                .await
                .unwrap();
        }
        let _ = ids_tx.send(ids);
        drain(&mut conn).await;
    })
    .await;

    let mut client = client_for(port, PASSWORD);
    client.connect().await.unwrap();
    for _ in 0..3 {
        client.execute("status").await.unwrap();
    }
    assert_eq!(ids_rx.await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credential() {
    let (closed_tx, closed_rx) = oneshot::channel();
    let port = spawn_server(|mut conn| async move {
        assert!(!answer_auth(&mut conn).await);
        // Client must hang up after a rejected handshake
        let next = conn.next().await;
        let _ = closed_tx.send(next.is_none());
    })
    .await;

    let metrics = Arc::new(Metrics::new());
    let mut client = client_for(port, "wrong").with_metrics(metrics.clone());
    assert!(matches!(
        client.connect().await,
        Err(ProtocolError::InvalidCredential)
    ));
    assert_eq!(client.state(), SessionState::Failed);
    assert!(closed_rx.await.unwrap());

    let snap = metrics.snapshot();
    assert_eq!(snap.handshakes_failed, 1);
    assert_eq!(snap.connections_active, 0);

    assert!(matches!(
        client.execute("status").await,
        Err(ProtocolError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_late_rejection_during_execute() {
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let _command = conn.next().await.unwrap().unwrap();
        conn.send(Packet::new(-1, PacketKind::ResponseValue, "").unwrap())
            .await
            .unwrap();
        drain(&mut conn).await;
    })
    .await;

    let mut client = client_for(port, PASSWORD);
    client.connect().await.unwrap();
    assert!(matches!(
        client.execute("status").await,
        Err(ProtocolError::InvalidCredential)
    ));
    assert_eq!(client.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_unexpected_kind_keeps_session_usable() {
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let first = conn.next().await.unwrap().unwrap();
        conn.send(Packet::new(first.id(), PacketKind::Command, "odd").unwrap())
            .await
            .unwrap();
        let second = conn.next().await.unwrap().unwrap();
        conn.send(Packet::new(second.id(), PacketKind::ResponseValue, "fine").unwrap())
            .await
            .unwrap();
        drain(&mut conn).await;
    })
    .await;

    let mut client = client_for(port, PASSWORD);
    client.connect().await.unwrap();

    match client.execute("first").await {
        Err(ProtocolError::UnexpectedResponseKind { expected, actual }) => {
            assert_eq!(expected, PacketKind::ResponseValue);
            assert_eq!(actual, PacketKind::Command);
        }
        other => panic!("Expected UnexpectedResponseKind, got {other:?}"),
    }
    assert!(client.is_authenticated());
    assert_eq!(client.execute("second").await.unwrap(), "fine");
}

#[tokio::test]
async fn test_response_delivered_one_byte_at_a_time() {
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let command = conn.next().await.unwrap().unwrap();
        let bytes = Packet::new(command.id(), PacketKind::ResponseValue, "no players online")
            .unwrap()
            .to_bytes();
        let stream = conn.get_mut();
        for byte in bytes {
            stream.write_all(&[byte]).await.unwrap();
            stream.flush().await.unwrap();
            sleep(Duration::from_millis(2)).await;
        }
        drain(&mut conn).await;
    })
    .await;

    let mut client = client_for(port, PASSWORD);
    client.connect().await.unwrap();
    assert_eq!(
        client.execute("ListPlayers").await.unwrap(),
        "no players online"
    );
}

#[tokio::test]
async fn test_bad_terminator_fails_session() {
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let command = conn.next().await.unwrap().unwrap();
        let mut bytes = Packet::new(command.id(), PacketKind::ResponseValue, "x")
            .unwrap()
            .to_bytes();
        let last = bytes.len() - 1;
        bytes[last] = 0x01;
        conn.get_mut().write_all(&bytes).await.unwrap();
        drain(&mut conn).await;
    })
    .await;

    let mut client = client_for(port, PASSWORD);
    client.connect().await.unwrap();
    assert!(matches!(
        client.execute("status").await,
        Err(ProtocolError::FramingError(_))
    ));
    assert_eq!(client.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_unknown_kind_is_rejected() {
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let command = conn.next().await.unwrap().unwrap();
        let mut frame = Vec::new();
        frame.extend_from_slice(&10i32.to_le_bytes());
        frame.extend_from_slice(&command.id().to_le_bytes());
        frame.extend_from_slice(&7i32.to_le_bytes());
        frame.extend_from_slice(&TERMINATOR);
        conn.get_mut().write_all(&frame).await.unwrap();
        drain(&mut conn).await;
    })
    .await;

    let mut client = client_for(port, PASSWORD);
    client.connect().await.unwrap();
    assert!(matches!(
        client.execute("status").await,
        Err(ProtocolError::UnknownPacketKind(7))
    ));
}

#[tokio::test]
async fn test_invalid_utf8_output_is_not_an_error() {
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let command = conn.next().await.unwrap().unwrap();
        conn.send(
            Packet::new(command.id(), PacketKind::ResponseValue, vec![b'h', b'i', 0xC3]).unwrap(),
        )
        .await
        .unwrap();
        drain(&mut conn).await;
    })
    .await;

    let mut client = client_for(port, PASSWORD);
    client.connect().await.unwrap();
    assert_eq!(client.execute("status").await.unwrap(), "hi\u{FFFD}");
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_oversized_response_is_refused() {
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let _command = conn.next().await.unwrap().unwrap();
        conn.get_mut()
            .write_all(&(64 * 1024i32).to_le_bytes())
            .await
            .unwrap();
        drain(&mut conn).await;
    })
    .await;

    let mut config = RconConfig::new("127.0.0.1", port, PASSWORD);
    config.max_response_size = 4096;
    let mut client = RconClient::new(config);
    client.connect().await.unwrap();
    assert!(matches!(
        client.execute("status").await,
        Err(ProtocolError::OversizedPacket(65536))
    ));
    assert_eq!(client.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_close_twice_after_connect() {
    let (closed_tx, closed_rx) = oneshot::channel();
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let next = conn.next().await;
        let _ = closed_tx.send(next.is_none());
    })
    .await;

    let metrics = Arc::new(Metrics::new());
    let mut client = client_for(port, PASSWORD).with_metrics(metrics.clone());
    client.connect().await.unwrap();
    assert_eq!(metrics.snapshot().connections_active, 1);

    client.close().await;
    client.close().await;
    assert_eq!(client.state(), SessionState::Closed);
    assert_eq!(metrics.snapshot().connections_active, 0);
    assert!(closed_rx.await.unwrap());

    assert!(matches!(
        client.execute("status").await,
        Err(ProtocolError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut client = client_for(port, PASSWORD);
    assert!(matches!(
        client.connect().await,
        Err(ProtocolError::ConnectError { .. })
    ));
    assert_eq!(client.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_dropping_client_releases_connection() {
    let (closed_tx, closed_rx) = oneshot::channel();
    let port = spawn_server(|mut conn| async move {
        answer_auth(&mut conn).await;
        let next = conn.next().await;
        let _ = closed_tx.send(next.is_none());
    })
    .await;

    let metrics = Arc::new(Metrics::new());
    let mut client = client_for(port, PASSWORD).with_metrics(metrics.clone());
    client.connect().await.unwrap();
    drop(client);

    assert!(closed_rx.await.unwrap());
    assert_eq!(metrics.snapshot().connections_active, 0);
}
