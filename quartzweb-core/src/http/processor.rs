//! Per-connection request pipeline
//!
//! parse head -> decode body -> before-filters -> WebSocket upgrade or
//! handler dispatch -> after-filters -> temp-file cleanup -> send.
//!
//! A connection serves exactly one request. Faults with an HTTP status are
//! answered; a lost peer or an unusable start line drops the connection
//! without a response.

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::body::decode_body;
use super::constants::content_types;
use super::handler::{HttpContext, HttpRequestHandler};
use super::parser::{ParseFailure, RequestParser};
use super::reader::RequestReader;
use super::request::HttpRequest;
use super::response::{HttpResponse, StatusCode};
use super::router::Router;
use super::websocket::{self, Handshake, WebSocketConnection};
use super::{HttpError, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_LINE_LENGTH, DEFAULT_READ_BUFFER_SIZE};
use crate::storage::{TempFileGuard, TempFileStore};

/// What happened to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// A response with this status was written
    Responded(StatusCode),
    /// The connection was handed to a WebSocket handler
    Upgraded,
    /// Closed without a response
    Dropped,
}

/// Runs the request pipeline for one connection at a time
///
/// Cheap to clone; every worker thread holds its own copy.
#[derive(Clone)]
pub struct RequestProcessor {
    router: Arc<Router>,
    store: Arc<dyn TempFileStore>,
    max_body_size: u64,
    read_buffer_size: usize,
    max_line_length: usize,
}

impl RequestProcessor {
    pub fn new(router: Arc<Router>, store: Arc<dyn TempFileStore>) -> Self {
        Self {
            router,
            store,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Largest Content-Length accepted
    pub fn with_max_body_size(mut self, max_body_size: u64) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    /// Longest start-line, header or multipart header line accepted
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Serve the single request arriving on `stream`
    pub fn process<S>(&self, stream: S, remote_addr: Option<SocketAddr>) -> ConnectionOutcome
    where
        S: Read + Write + Send + 'static,
    {
        let mut uploads = TempFileGuard::new(Arc::clone(&self.store));
        let reader =
            RequestReader::new(stream, self.read_buffer_size).with_max_line_length(self.max_line_length);
        let mut parser = RequestParser::new(reader, self.max_body_size);

        let mut fault = match parser.parse_head() {
            Ok(()) => None,
            Err(ParseFailure::Fault(err)) => Some(err),
            Err(failure) => return dropped(remote_addr, &failure),
        };

        let (request, mut reader) = parser.into_parts();
        let Some(mut request) = request else {
            return ConnectionOutcome::Dropped;
        };
        if let Some(addr) = remote_addr {
            request.set_remote_addr(addr);
        }

        if fault.is_none() {
            match decode_body(&mut reader, &mut request, &mut uploads) {
                Ok(()) => {}
                Err(ParseFailure::Fault(err)) => fault = Some(err),
                Err(failure) => return dropped(remote_addr, &failure),
            }
        }

        let mut context = HttpContext::new();
        let mut response = HttpResponse::ok();
        let mut served_by: Option<Arc<dyn HttpRequestHandler>> = None;

        if fault.is_none() && self.router.apply_before_filters(&request, &mut response, &mut context) {
            if let Some(handshake) = websocket::negotiate(&request, &self.router) {
                handshake.apply(&mut response);
                self.router.apply_after_filters(&request, &mut response, &mut context);
                uploads.cleanup();
                return hand_off(reader, response, handshake, &request);
            }

            match self.router.resolve_http(request.target()) {
                Some((handler, path)) => {
                    let handler = Arc::clone(handler);
                    fault = invoke(handler.as_ref(), path, &request, &mut response, &mut context).err();
                    served_by = Some(handler);
                }
                None => fault = Some(HttpError::NotFound),
            }
        }

        if let Some(fault) = &fault {
            apply_fault(&mut response, fault);
        }
        self.router.apply_after_filters(&request, &mut response, &mut context);
        uploads.cleanup();

        let status = response.status();
        log::debug!("{} {} -> {}", request.method(), request.target(), status.as_u16());

        let (mut stream, _) = reader.into_parts();
        if let Err(e) = response.send(&mut stream) {
            log::warn!("Failed to send response to {}: {}", peer(remote_addr), e);
            return ConnectionOutcome::Dropped;
        }

        if let Some(handler) = served_by {
            handler.request_completed(&context);
        }
        ConnectionOutcome::Responded(status)
    }
}

impl std::fmt::Debug for RequestProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestProcessor")
            .field("router", &self.router)
            .field("max_body_size", &self.max_body_size)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("max_line_length", &self.max_line_length)
            .finish()
    }
}

/// Call the handler, mapping errors and panics onto [`HttpError`]
fn invoke(
    handler: &dyn HttpRequestHandler,
    path: &str,
    request: &HttpRequest,
    response: &mut HttpResponse,
    context: &mut HttpContext,
) -> Result<(), HttpError> {
    let outcome =
        panic::catch_unwind(AssertUnwindSafe(|| handler.handle(path, request, response, context)));
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            let mapped = HttpError::from_handler_error(&err);
            if matches!(mapped, HttpError::Internal(_)) {
                log::error!("Handler for {} failed: {:#}", request.target(), err);
            }
            Err(mapped)
        }
        Err(_) => {
            log::error!("Handler for {} panicked", request.target());
            Err(HttpError::Internal("handler panicked".to_string()))
        }
    }
}

/// Replace whatever the response held with the fault's status and message
fn apply_fault(response: &mut HttpResponse, fault: &HttpError) {
    let message = fault.client_message();
    response.clear_body();
    response.set_status(fault.status());
    response.set_reason(message.as_str());
    response.set_body(content_types::TEXT, message);
}

/// Send the `101` response and give the stream to the WebSocket handler
fn hand_off<S>(
    reader: RequestReader<S>,
    response: HttpResponse,
    handshake: Handshake,
    request: &HttpRequest,
) -> ConnectionOutcome
where
    S: Read + Write + Send + 'static,
{
    let (mut stream, read_ahead) = reader.into_parts();
    if let Err(e) = response.send(&mut stream) {
        log::warn!("Failed to complete WebSocket handshake for {}: {}", request.target(), e);
        return ConnectionOutcome::Dropped;
    }

    log::debug!("Upgraded {} to WebSocket (protocol {:?})", request.target(), handshake.protocol);
    let connection =
        WebSocketConnection::new(Box::new(stream), read_ahead, handshake.protocol, handshake.path);
    handshake.handler.connected(connection);
    ConnectionOutcome::Upgraded
}

fn dropped(remote_addr: Option<SocketAddr>, failure: &ParseFailure) -> ConnectionOutcome {
    match failure {
        ParseFailure::Malformed(reason) => log::debug!("Dropping {}: {}", peer(remote_addr), reason),
        ParseFailure::Lost(end) => log::debug!("Connection {} lost: {:?}", peer(remote_addr), end),
        ParseFailure::Fault(err) => log::debug!("Dropping {}: {}", peer(remote_addr), err),
    }
    ConnectionOutcome::Dropped
}

fn peer(remote_addr: Option<SocketAddr>) -> String {
    remote_addr.map(|a| a.to_string()).unwrap_or_else(|| "unknown peer".to_string())
}
