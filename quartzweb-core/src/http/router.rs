//! Route table and filter chains
//!
//! Handlers are registered under URI prefixes and resolved by longest-prefix
//! match against the raw request target. The router is populated before the
//! server starts and is read-only while connections are served.

use std::sync::Arc;

use super::handler::{FnHandler, HttpContext, HttpRequestHandler};
use super::request::HttpRequest;
use super::response::HttpResponse;
use super::websocket::WebSocketHandler;

/// Filter run before dispatch; returning `false` vetoes further processing
pub type BeforeFilter =
    Arc<dyn Fn(&HttpRequest, &mut HttpResponse, &mut HttpContext) -> bool + Send + Sync>;

/// Filter run after dispatch, whatever the outcome
pub type AfterFilter = Arc<dyn Fn(&HttpRequest, &mut HttpResponse, &mut HttpContext) + Send + Sync>;

/// Routes for HTTP and WebSocket handlers plus the filter chains
#[derive(Default, Clone)]
pub struct Router {
    http: Vec<(String, Arc<dyn HttpRequestHandler>)>,
    websocket: Vec<(String, Arc<dyn WebSocketHandler>)>,
    before: Vec<BeforeFilter>,
    after: Vec<AfterFilter>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an HTTP handler; an existing handler on the same prefix is replaced
    pub fn add_http<H>(&mut self, prefix: &str, handler: H) -> &mut Self
    where
        H: HttpRequestHandler + 'static,
    {
        insert_route(&mut self.http, prefix, Arc::new(handler));
        self
    }

    /// Register a closure as an HTTP handler
    pub fn add_http_fn<F>(&mut self, prefix: &str, handler: F) -> &mut Self
    where
        F: Fn(&str, &HttpRequest, &mut HttpResponse, &mut HttpContext) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.add_http(prefix, FnHandler(handler))
    }

    /// Register a WebSocket handler
    pub fn add_websocket<H>(&mut self, prefix: &str, handler: H) -> &mut Self
    where
        H: WebSocketHandler + 'static,
    {
        insert_route(&mut self.websocket, prefix, Arc::new(handler));
        self
    }

    pub fn add_before_filter<F>(&mut self, filter: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse, &mut HttpContext) -> bool + Send + Sync + 'static,
    {
        self.before.push(Arc::new(filter));
        self
    }

    pub fn add_after_filter<F>(&mut self, filter: F) -> &mut Self
    where
        F: Fn(&HttpRequest, &mut HttpResponse, &mut HttpContext) + Send + Sync + 'static,
    {
        self.after.push(Arc::new(filter));
        self
    }

    /// Longest-prefix HTTP handler for `target`, with the unmatched remainder
    pub fn resolve_http<'t>(&self, target: &'t str) -> Option<(&Arc<dyn HttpRequestHandler>, &'t str)> {
        longest_prefix(&self.http, target)
    }

    /// Longest-prefix WebSocket handler for `target`, with the unmatched remainder
    pub fn resolve_websocket<'t>(&self, target: &'t str) -> Option<(&Arc<dyn WebSocketHandler>, &'t str)> {
        longest_prefix(&self.websocket, target)
    }

    /// Run before-filters in order, stopping at the first veto
    ///
    /// Returns whether processing should continue.
    pub fn apply_before_filters(
        &self,
        request: &HttpRequest,
        response: &mut HttpResponse,
        context: &mut HttpContext,
    ) -> bool {
        self.before.iter().all(|filter| filter(request, response, context))
    }

    pub fn apply_after_filters(&self, request: &HttpRequest, response: &mut HttpResponse, context: &mut HttpContext) {
        for filter in &self.after {
            filter(request, response, context);
        }
    }

    pub fn http_routes(&self) -> impl Iterator<Item = &str> {
        self.http.iter().map(|(prefix, _)| prefix.as_str())
    }

    pub fn websocket_routes(&self) -> impl Iterator<Item = &str> {
        self.websocket.iter().map(|(prefix, _)| prefix.as_str())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("http", &self.http_routes().collect::<Vec<_>>())
            .field("websocket", &self.websocket_routes().collect::<Vec<_>>())
            .field("before_filters", &self.before.len())
            .field("after_filters", &self.after.len())
            .finish()
    }
}

fn insert_route<T: ?Sized>(routes: &mut Vec<(String, Arc<T>)>, prefix: &str, handler: Arc<T>) {
    match routes.iter_mut().find(|(p, _)| p == prefix) {
        Some(entry) => entry.1 = handler,
        None => routes.push((prefix.to_string(), handler)),
    }
}

fn longest_prefix<'r, 't, T: ?Sized>(
    routes: &'r [(String, Arc<T>)],
    target: &'t str,
) -> Option<(&'r Arc<T>, &'t str)> {
    routes
        .iter()
        .filter(|(prefix, _)| target.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(prefix, handler)| (handler, &target[prefix.len()..]))
}
