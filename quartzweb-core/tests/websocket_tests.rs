//! WebSocket upgrade and hand-off over scripted connections

mod common;

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use common::Harness;
use quartzweb_core::http::{ConnectionOutcome, Router, StatusCode, WebSocketConnection, WebSocketHandler};

#[derive(Default)]
struct Session {
    path: String,
    protocol: String,
    received: Vec<u8>,
}

/// Accepts only `chat`, records everything it reads, answers `pong`
struct ChatOnly(Arc<Mutex<Option<Session>>>);

impl WebSocketHandler for ChatOnly {
    fn will_accept(&self, _path: &str, protocol: &str) -> bool {
        protocol == "chat"
    }

    fn connected(&self, mut connection: WebSocketConnection) {
        let mut received = Vec::new();
        connection.read_to_end(&mut received).unwrap();
        connection.write_all(b"pong").unwrap();
        *self.0.lock().unwrap() = Some(Session {
            path: connection.path().to_string(),
            protocol: connection.protocol().to_string(),
            received,
        });
    }
}

fn upgrade_head(extra: &str) -> Vec<u8> {
    format!(
        "GET /sockets/room-1 HTTP/1.1\r\n\
Host: device.local\r\n\
Connection: keep-alive, Upgrade\r\n\
Upgrade: websocket\r\n\
Sec-WebSocket-Version: 13\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
{}\r\n",
        extra
    )
    .into_bytes()
}

#[test]
fn test_upgrade_hands_off_with_read_ahead() {
    let session = Arc::new(Mutex::new(None));
    let mut router = Router::new();
    router
        .add_websocket("/sockets/", ChatOnly(Arc::clone(&session)))
        .add_after_filter(|_, response, _| response.set_header("X-Device", "d1"));
    let harness = Harness::new(router);

    let mut first = upgrade_head("Sec-WebSocket-Protocol: superchat, chat\r\n");
    first.extend_from_slice(b"\x81\x85early");
    let (outcome, tap) = harness.run(vec![first, b"later".to_vec()]);

    assert_eq!(outcome, ConnectionOutcome::Upgraded);
    let written = tap.written();
    assert!(written.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(written.contains("Upgrade: websocket\r\n"));
    assert!(written.contains("Connection: Upgrade\r\n"));
    assert!(written.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
    assert!(written.contains("Sec-WebSocket-Protocol: chat\r\n"));
    assert!(written.contains("X-Device: d1\r\n"));
    assert!(!written.contains("Content-Length"));
    assert!(written.ends_with("\r\n\r\npong"));

    let session = session.lock().unwrap().take().unwrap();
    assert_eq!(session.path, "room-1");
    assert_eq!(session.protocol, "chat");
    assert_eq!(session.received, b"\x81\x85earlylater");
}

#[test]
fn test_no_acceptable_protocol_falls_through_to_http() {
    let session = Arc::new(Mutex::new(None));
    let mut router = Router::new();
    router.add_websocket("/sockets/", ChatOnly(Arc::clone(&session)));
    router.add_http_fn("/sockets/", |_, _, response, _| {
        response.set_body("text/plain", "plain http");
        Ok(())
    });
    let harness = Harness::new(router);

    let (outcome, tap) = harness.run(vec![upgrade_head("Sec-WebSocket-Protocol: superchat\r\n")]);

    assert_eq!(outcome, ConnectionOutcome::Responded(StatusCode::Ok));
    assert!(tap.written().ends_with("plain http"));
    assert!(session.lock().unwrap().is_none());
}

#[test]
fn test_wrong_version_is_not_upgraded() {
    let session = Arc::new(Mutex::new(None));
    let mut router = Router::new();
    router.add_websocket("/sockets/", ChatOnly(Arc::clone(&session)));
    let harness = Harness::new(router);

    let head = String::from_utf8(upgrade_head("Sec-WebSocket-Protocol: chat\r\n"))
        .unwrap()
        .replace("Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: 8");
    let (outcome, _) = harness.run(vec![head.into_bytes()]);

    assert_eq!(outcome, ConnectionOutcome::Responded(StatusCode::NotFound));
    assert!(session.lock().unwrap().is_none());
}
