//! Request handler capability and per-request context

use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::request::HttpRequest;
use super::response::HttpResponse;

/// Per-request values shared by filters and the handler
///
/// Values are keyed by their type, so each type holds at most one value.
#[derive(Default)]
pub struct HttpContext {
    values: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl HttpContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning the previous one of the same type
    pub fn insert<T: Any + Send>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.values.get_mut(&TypeId::of::<T>()).and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send>(&mut self) -> Option<T> {
        self.values.remove(&TypeId::of::<T>()).and_then(|v| v.downcast::<T>().ok()).map(|v| *v)
    }

    pub fn contains<T: Any + Send>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }
}

impl std::fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpContext").field("values", &self.values.len()).finish()
    }
}

/// An HTTP endpoint registered under a route prefix
pub trait HttpRequestHandler: Send + Sync {
    /// Fill in `response` for `request`
    ///
    /// `path` is the part of the target after the matched prefix. Returning an
    /// [`HttpError`](super::HttpError) answers with that status; any other
    /// error becomes a 500.
    fn handle(
        &self,
        path: &str,
        request: &HttpRequest,
        response: &mut HttpResponse,
        context: &mut HttpContext,
    ) -> anyhow::Result<()>;

    /// Called once the response has been written and flushed
    fn request_completed(&self, _context: &HttpContext) {}
}

/// Adapter turning a closure into an [`HttpRequestHandler`]
pub struct FnHandler<F>(pub F);

impl<F> HttpRequestHandler for FnHandler<F>
where
    F: Fn(&str, &HttpRequest, &mut HttpResponse, &mut HttpContext) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(
        &self,
        path: &str,
        request: &HttpRequest,
        response: &mut HttpResponse,
        context: &mut HttpContext,
    ) -> anyhow::Result<()> {
        (self.0)(path, request, response, context)
    }
}
