//! QuartzWeb - Core
//!
//! The request ingestion pipeline of a small embeddable HTTP/WebSocket server.
//!
//! # Overview
//!
//! A connection is read through a buffered reader, its start line and headers
//! are parsed incrementally, the body is decoded (URL-encoded forms, multipart
//! forms with file parts streamed to temp storage, or raw bytes), and the
//! request is dispatched to the handler owning the longest matching path
//! prefix. A valid RFC 6455 handshake instead answers `101 Switching
//! Protocols` and hands the raw connection to a WebSocket handler.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quartzweb_core::config::QuartzConfig;
//! use quartzweb_core::http::{HttpServer, Router};
//! use quartzweb_core::storage::DiskTempStore;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = QuartzConfig::load()?;
//!     config.validate()?;
//!     quartzweb_core::logging::init_logging(&config.logging);
//!
//!     let mut router = Router::new();
//!     router.add_http_fn("/hello", |_, request, response, _| {
//!         response.set_body("text/plain", format!("hello from {}", request.path()));
//!         Ok(())
//!     });
//!
//!     let store = Arc::new(DiskTempStore::new(&config.uploads.temp_dir)?);
//!     HttpServer::from_config(&config.server, router, store)
//!         .serve(config.server.bind_address())?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`http`] - parsing, body decoding, routing, WebSocket upgrade, server loop
//! - [`storage`] - temp-file storage for uploaded files
//! - [`config`] - TOML/env configuration
//! - [`logging`] - `env_logger` setup

pub mod config; // Configuration system with TOML support
pub mod http;
pub mod logging;
pub mod storage; // Upload temp files

// Re-exports of main types and traits
pub use config::QuartzConfig;
pub use http::{
    HttpContext, HttpError, HttpRequest, HttpRequestHandler, HttpResponse, HttpServer,
    RequestProcessor, Router, WebSocketConnection, WebSocketHandler,
};
pub use storage::{DiskTempStore, TempFileGuard, TempFileStore};
