//! HTTP server implementation using std::net::TcpListener
//!
//! Each accepted connection gets its own thread, which runs the request
//! pipeline once and closes the socket, unless the request was upgraded to a
//! WebSocket, in which case the thread stays with the socket.

use std::io::Read;
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::processor::{ConnectionOutcome, RequestProcessor};
use super::router::Router;
use super::{HttpError, HttpResult};
use crate::config::ServerConfig;
use crate::storage::TempFileStore;

/// How long a closing connection may take to deliver unread request bytes
const LINGER_TIMEOUT: Duration = Duration::from_millis(250);

/// Upper bound on unread request bytes drained before closing
const LINGER_MAX_BYTES: usize = 64 * 1024;

/// Thread-per-connection HTTP server
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use quartzweb_core::http::{HttpServer, Router};
/// use quartzweb_core::storage::DiskTempStore;
///
/// let mut router = Router::new();
/// router.add_http_fn("/status", |_, _, response, _| {
///     response.set_body("text/plain", "up");
///     Ok(())
/// });
/// let store = Arc::new(DiskTempStore::new("TempSessionData")?);
/// HttpServer::new(router, store).serve("0.0.0.0:8000")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct HttpServer {
    processor: RequestProcessor,
}

impl HttpServer {
    /// Create a server with default limits
    pub fn new(router: Router, store: Arc<dyn TempFileStore>) -> Self {
        Self { processor: RequestProcessor::new(Arc::new(router), store) }
    }

    /// Create a server with limits taken from the configuration
    pub fn from_config(config: &ServerConfig, router: Router, store: Arc<dyn TempFileStore>) -> Self {
        let processor = RequestProcessor::new(Arc::new(router), store)
            .with_max_body_size(config.max_body_size)
            .with_read_buffer_size(config.read_buffer_size)
            .with_max_line_length(config.max_line_length);
        Self { processor }
    }

    pub fn processor(&self) -> &RequestProcessor {
        &self.processor
    }

    /// Bind to an address and serve connections until the listener fails
    ///
    /// Blocks the current thread.
    pub fn serve<A: ToSocketAddrs + std::fmt::Display>(&self, addr: A) -> HttpResult<()> {
        let listener = TcpListener::bind(&addr)
            .map_err(|e| HttpError::Server(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve_listener(listener)
    }

    /// Serve connections from an already bound listener
    pub fn serve_listener(&self, listener: TcpListener) -> HttpResult<()> {
        let local = listener
            .local_addr()
            .map_err(|e| HttpError::Server(format!("Listener has no local address: {}", e)))?;
        log::info!("HTTP server listening on {}", local);

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => self.spawn_connection(stream),
                Err(e) => log::error!("Failed to accept connection: {}", e),
            }
        }

        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream) {
        let processor = self.processor.clone();
        let spawned = thread::Builder::new().name("quartzweb-conn".to_string()).spawn(move || {
            let peer = stream.peer_addr().ok();
            let closer = stream.try_clone().ok();
            let outcome = processor.process(stream, peer);
            if outcome != ConnectionOutcome::Upgraded {
                if let Some(closer) = closer {
                    close_gracefully(closer);
                }
            }
        });
        if let Err(e) = spawned {
            log::error!("Failed to spawn connection thread: {}", e);
        }
    }
}

/// Half-close, then drain briefly so unread request bytes do not turn the
/// close into a reset that discards the response
fn close_gracefully(mut stream: TcpStream) {
    if stream.shutdown(Shutdown::Write).is_err() {
        return;
    }
    if stream.set_read_timeout(Some(LINGER_TIMEOUT)).is_err() {
        return;
    }
    let mut scratch = [0u8; 4096];
    let mut drained = 0;
    while drained < LINGER_MAX_BYTES {
        match stream.read(&mut scratch) {
            Ok(0) | Err(_) => break,
            Ok(n) => drained += n,
        }
    }
}
