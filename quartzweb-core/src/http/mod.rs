//! Embedded HTTP/1.x and WebSocket server
//!
//! The request pipeline is built from scratch on the standard library's
//! blocking sockets. One connection carries exactly one request; the only
//! exception is a WebSocket upgrade, after which the connection belongs to the
//! WebSocket handler.
//!
//! # Architecture
//!
//! - [`reader`] - buffered line/byte reader over the connection
//! - [`parser`] - start line and header state machine
//! - [`body`], [`form`], [`multipart`] - body decoding
//! - [`websocket`] - upgrade handshake and subprotocol negotiation
//! - [`router`], [`handler`] - route table, filters and handler capability
//! - [`processor`] - the per-connection pipeline
//! - [`server`] - TCP accept loop
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quartzweb_core::http::{HttpServer, Router};
//! use quartzweb_core::storage::DiskTempStore;
//!
//! let mut router = Router::new();
//! router.add_http_fn("/hello", |_, _, response, _| {
//!     response.set_body("text/plain", "hello");
//!     Ok(())
//! });
//! let server = HttpServer::new(router, Arc::new(DiskTempStore::new("TempSessionData")?));
//! server.serve("127.0.0.1:8000")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod body;
pub mod error;
pub mod form;
pub mod handler;
pub mod headers;
pub mod multipart;
pub mod parser;
pub mod processor;
pub mod reader;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod websocket;

// Re-export main types for convenience
pub use error::HttpError;
pub use form::{DecodedData, HttpFile, HttpFileCollection, Parameters};
pub use handler::{HttpContext, HttpRequestHandler};
pub use headers::HeaderMap;
pub use processor::{ConnectionOutcome, RequestProcessor};
pub use reader::StreamEnd;
pub use request::{Cookie, HttpMethod, HttpRequest, HttpVersion, RequestBody};
pub use response::{HttpResponse, StatusCode};
pub use router::{AfterFilter, BeforeFilter, Router};
pub use server::HttpServer;
pub use websocket::{WebSocketConnection, WebSocketHandler};

/// Result type for HTTP operations
pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// Largest accepted Content-Length (about 101 MB)
pub const DEFAULT_MAX_BODY_SIZE: u64 = 101_000_000;

/// Initial size of the per-connection read buffer
pub const DEFAULT_READ_BUFFER_SIZE: usize = 16 * 1024;

/// Longest start-line or header line accepted, terminator excluded
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// HTTP/1.1 protocol constants
pub mod constants {
    /// Common HTTP headers
    pub mod headers {
        pub const CONTENT_TYPE: &str = "Content-Type";
        pub const CONTENT_LENGTH: &str = "Content-Length";
        pub const CONNECTION: &str = "Connection";
        pub const COOKIE: &str = "Cookie";
        pub const HOST: &str = "Host";
        pub const UPGRADE: &str = "Upgrade";
        pub const SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";
        pub const SEC_WEBSOCKET_VERSION: &str = "Sec-WebSocket-Version";
        pub const SEC_WEBSOCKET_PROTOCOL: &str = "Sec-WebSocket-Protocol";
        pub const SEC_WEBSOCKET_ACCEPT: &str = "Sec-WebSocket-Accept";
    }

    /// Common content types
    pub mod content_types {
        pub const JSON: &str = "application/json";
        pub const HTML: &str = "text/html; charset=utf-8";
        pub const TEXT: &str = "text/plain; charset=utf-8";
        pub const BINARY: &str = "application/octet-stream";
        pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
        pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
    }

    /// HTTP line ending
    pub const CRLF: &str = "\r\n";
}
