//! WebSocket upgrade handshake (RFC 6455 opening handshake)
//!
//! Only the HTTP side of the upgrade lives here: validating the request,
//! negotiating a subprotocol with the registered handler and computing the
//! accept key. Framing is the handler's business once it owns the
//! [`WebSocketConnection`].

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use sha1::{Digest, Sha1};

use super::constants::headers;
use super::request::HttpRequest;
use super::response::{HttpResponse, StatusCode};
use super::router::Router;

/// Fixed GUID appended to the client key
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version accepted
pub const WEBSOCKET_VERSION: u32 = 13;

/// Compute `Sec-WebSocket-Accept` for a client key
pub fn compute_accept_key(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.trim().as_bytes());
    sha1.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(sha1.finalize())
}

/// Byte stream an upgraded connection runs on
pub trait Duplex: Read + Write + Send {}

impl<T: Read + Write + Send> Duplex for T {}

/// A connection handed over after a successful upgrade
///
/// Reads first drain any bytes the request reader had already buffered past
/// the headers, then continue on the raw stream.
pub struct WebSocketConnection {
    stream: Box<dyn Duplex>,
    read_ahead: VecDeque<u8>,
    protocol: String,
    path: String,
}

impl WebSocketConnection {
    pub fn new(stream: Box<dyn Duplex>, read_ahead: Vec<u8>, protocol: String, path: String) -> Self {
        Self { stream, read_ahead: read_ahead.into(), protocol, path }
    }

    /// Negotiated subprotocol, empty when none
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Part of the request target after the matched route prefix
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Read for WebSocketConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.read_ahead.is_empty() {
            return self.stream.read(buf);
        }
        self.read_ahead.read(buf)
    }
}

impl Write for WebSocketConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl std::fmt::Debug for WebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection")
            .field("protocol", &self.protocol)
            .field("path", &self.path)
            .field("read_ahead", &self.read_ahead.len())
            .finish()
    }
}

/// Server-side WebSocket endpoint
pub trait WebSocketHandler: Send + Sync {
    /// Whether to accept an upgrade for `path` speaking `protocol`
    ///
    /// Called once per offered subprotocol, in the client's order; with no
    /// `Sec-WebSocket-Protocol` header it is called once with `""`.
    fn will_accept(&self, path: &str, protocol: &str) -> bool;

    /// Take ownership of the upgraded connection
    ///
    /// Runs on the connection's worker thread after the `101` response has
    /// been flushed, and may block for the lifetime of the socket.
    fn connected(&self, connection: WebSocketConnection);
}

/// An accepted upgrade, ready to be written to the response
#[derive(Clone)]
pub struct Handshake {
    pub accept_key: String,
    pub protocol: String,
    /// Target remainder after the matched route prefix
    pub path: String,
    pub handler: Arc<dyn WebSocketHandler>,
}

impl Handshake {
    /// Turn `response` into the `101 Switching Protocols` answer
    pub fn apply(&self, response: &mut HttpResponse) {
        response.clear_body();
        response.set_status(StatusCode::SwitchingProtocols);
        response.set_header(headers::UPGRADE, "websocket");
        response.set_header(headers::CONNECTION, "Upgrade");
        response.set_header(headers::SEC_WEBSOCKET_ACCEPT, &self.accept_key);
        if !self.protocol.is_empty() {
            response.set_header(headers::SEC_WEBSOCKET_PROTOCOL, &self.protocol);
        }
    }
}

impl std::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake")
            .field("accept_key", &self.accept_key)
            .field("protocol", &self.protocol)
            .field("path", &self.path)
            .finish()
    }
}

/// Decide whether `request` is an acceptable WebSocket upgrade
///
/// Any failed precondition means "not an upgrade" and the request continues
/// through ordinary dispatch.
pub fn negotiate(request: &HttpRequest, router: &Router) -> Option<Handshake> {
    let header_contains = |name: &str, needle: &str| {
        request.header(name).is_some_and(|v| v.to_ascii_lowercase().contains(needle))
    };

    if !header_contains(headers::CONNECTION, "upgrade") || !header_contains(headers::UPGRADE, "websocket") {
        return None;
    }

    let version = request.header(headers::SEC_WEBSOCKET_VERSION)?.trim().parse::<u32>().ok()?;
    if version != WEBSOCKET_VERSION {
        log::debug!("WebSocket version {} not supported", version);
        return None;
    }

    let key = request.header(headers::SEC_WEBSOCKET_KEY).map(str::trim).filter(|k| !k.is_empty())?;

    let (handler, path) = router.resolve_websocket(request.target())?;

    let protocol = match request.header(headers::SEC_WEBSOCKET_PROTOCOL) {
        Some(offered) => offered
            .split(',')
            .map(str::trim)
            .find(|candidate| handler.will_accept(path, candidate))?
            .to_string(),
        None => {
            if !handler.will_accept(path, "") {
                return None;
            }
            String::new()
        }
    };

    Some(Handshake {
        accept_key: compute_accept_key(key),
        protocol,
        path: path.to_string(),
        handler: Arc::clone(handler),
    })
}
