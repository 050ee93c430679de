//! Handlers mounted by `quartzweb serve`

use std::io::Read;
use std::time::Instant;

use quartzweb_core::http::constants::content_types;
use quartzweb_core::http::{
    HttpContext, HttpRequest, HttpRequestHandler, HttpResponse, Router, WebSocketConnection,
    WebSocketHandler,
};
use serde_json::json;

/// Subprotocol accepted by [`ByteCounter`]
pub const COUNT_PROTOCOL: &str = "count";

/// Time the request entered dispatch, stored by the before filter
struct Started(Instant);

pub fn router() -> Router {
    let mut router = Router::new();
    router
        .add_before_filter(|request, _, context| {
            log::debug!("{} {}", request.method(), request.target());
            context.insert(Started(Instant::now()));
            true
        })
        .add_after_filter(|_, response, context| {
            if let Some(Started(at)) = context.get::<Started>() {
                let elapsed = format!("total;dur={}", at.elapsed().as_millis());
                response.set_header("Server-Timing", &elapsed);
            }
        })
        .add_http_fn("/status", |_, _, response, _| {
            response.set_body(content_types::TEXT, "up");
            Ok(())
        })
        .add_http("/echo", FormEcho)
        .add_websocket("/sockets/", ByteCounter);
    router
}

/// Answers with a JSON description of the decoded request
pub struct FormEcho;

impl HttpRequestHandler for FormEcho {
    fn handle(
        &self,
        path: &str,
        request: &HttpRequest,
        response: &mut HttpResponse,
        _context: &mut HttpContext,
    ) -> anyhow::Result<()> {
        let parameters: Vec<_> = request.parameters().iter().map(|(k, v)| json!([k, v])).collect();
        let query: Vec<_> = request.query_params().iter().map(|(k, v)| json!([k, v])).collect();
        let files: Vec<_> = request
            .files()
            .iter()
            .map(|file| {
                let size = std::fs::metadata(file.temp_path()).map(|m| m.len()).ok();
                json!({
                    "name": file.name,
                    "file_name": file.original_file_name,
                    "content_type": file.content_type,
                    "size": size,
                })
            })
            .collect();

        let body = json!({
            "method": request.method().as_str(),
            "path": path,
            "query": query,
            "parameters": parameters,
            "files": files,
            "content_length": request.content().map(|c| c.len()),
        });
        response.set_body(content_types::JSON, serde_json::to_vec_pretty(&body)?);
        Ok(())
    }

    fn request_completed(&self, _context: &HttpContext) {
        log::debug!("Echo response delivered");
    }
}

/// Reads an upgraded connection until the peer closes and logs the byte count
pub struct ByteCounter;

impl WebSocketHandler for ByteCounter {
    fn will_accept(&self, path: &str, protocol: &str) -> bool {
        !path.contains("..") && (protocol.is_empty() || protocol == COUNT_PROTOCOL)
    }

    fn connected(&self, mut connection: WebSocketConnection) {
        let mut buffer = [0u8; 4096];
        let mut total = 0usize;
        loop {
            match connection.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) => {
                    log::debug!("WebSocket read failed: {}", e);
                    break;
                }
            }
        }
        log::info!("WebSocket /sockets/{} closed after {} bytes", connection.path(), total);
    }
}
