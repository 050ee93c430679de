//! HTTP response building and serialization
//!
//! Handlers receive a `&mut HttpResponse` and fill it in place; the pipeline
//! serializes it exactly once with [`HttpResponse::send`].

use std::fmt::Write as _;
use std::io::{self, Write};

use super::constants::{content_types, headers, CRLF};
use super::headers::HeaderMap;

/// HTTP status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    // 1xx Informational
    SwitchingProtocols = 101,

    // 2xx Success
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NoContent = 204,

    // 3xx Redirection
    MovedPermanently = 301,
    Found = 302,
    NotModified = 304,

    // 4xx Client Error
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    LengthRequired = 411,
    PayloadTooLarge = 413,

    // 5xx Server Error
    InternalServerError = 500,
    NotImplemented = 501,
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// Get the status code as a number
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the reason phrase for this status code
    pub fn reason_phrase(self) -> &'static str {
        match self {
            StatusCode::SwitchingProtocols => "Switching Protocols",
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::Found => "Found",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::LengthRequired => "Length Required",
            StatusCode::PayloadTooLarge => "Request Entity Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

/// HTTP response with fluent and in-place APIs
///
/// # Example
///
/// ```rust
/// use quartzweb_core::http::{HttpResponse, StatusCode};
///
/// let response = HttpResponse::ok()
///     .header("X-Device", "sensor-7")
///     .json(r#"{"temperature": 21.5}"#);
/// ```
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl HttpResponse {
    /// Create a new HTTP response with the given status code
    pub fn new(status: StatusCode) -> Self {
        let mut headers = HeaderMap::new();

        // One request per connection
        headers.set(headers::CONNECTION, "close");
        headers.set("Server", concat!("Quartzweb/", env!("CARGO_PKG_VERSION")));

        Self { status, reason: None, headers, body: Vec::new() }
    }

    /// Create a 200 OK response
    pub fn ok() -> Self {
        Self::new(StatusCode::Ok)
    }

    /// Create a 404 Not Found response
    pub fn not_found() -> Self {
        Self::new(StatusCode::NotFound)
    }

    /// Create a 500 Internal Server Error response
    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::InternalServerError)
    }

    // Builder methods

    /// Set a header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Set the Content-Type header
    pub fn content_type(self, content_type: &str) -> Self {
        self.header(headers::CONTENT_TYPE, content_type)
    }

    /// Set the body as raw bytes
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Set the body as text (UTF-8)
    pub fn text(self, text: &str) -> Self {
        self.content_type(content_types::TEXT).body(text.as_bytes().to_vec())
    }

    /// Set the body as HTML
    pub fn html(self, html: &str) -> Self {
        self.content_type(content_types::HTML).body(html.as_bytes().to_vec())
    }

    /// Set the body as JSON
    pub fn json(self, json: &str) -> Self {
        self.content_type(content_types::JSON).body(json.as_bytes().to_vec())
    }

    /// Set the body as binary data
    pub fn binary(self, data: Vec<u8>) -> Self {
        self.content_type(content_types::BINARY).body(data)
    }

    // In-place mutation, used by handlers and filters

    /// Change the status; any custom reason phrase is dropped with the old status
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.reason = None;
    }

    /// Override the reason phrase written on the status line
    ///
    /// Control characters are replaced by spaces so the status line stays one line.
    pub fn set_reason(&mut self, reason: impl Into<String>) {
        let reason: String = reason.into().chars().map(|c| if c.is_control() { ' ' } else { c }).collect();
        self.reason = Some(reason);
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.set(name, value);
    }

    pub fn set_body(&mut self, content_type: &str, body: impl Into<Vec<u8>>) {
        self.headers.set(headers::CONTENT_TYPE, content_type);
        self.body = body.into();
    }

    /// Append bytes to the body
    pub fn write_body(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    /// Drop any content a handler may already have produced
    pub fn clear_body(&mut self) {
        self.body.clear();
        self.headers.remove(headers::CONTENT_TYPE);
    }

    // Accessors

    /// Get the status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get all headers
    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Get the response body
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Convert the response to raw HTTP bytes for transmission
    ///
    /// `Content-Length` is always emitted except on `101 Switching Protocols`,
    /// after which the connection no longer speaks HTTP.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = String::new();
        let reason = self.reason.as_deref().unwrap_or(self.status.reason_phrase());

        // Status line; writing to a String cannot fail
        let _ = write!(head, "HTTP/1.1 {} {}{}", self.status.as_u16(), reason, CRLF);

        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case(headers::CONTENT_LENGTH) {
                continue;
            }
            let _ = write!(head, "{}: {}{}", name, value, CRLF);
        }

        if self.status != StatusCode::SwitchingProtocols {
            let _ = write!(head, "{}: {}{}", headers::CONTENT_LENGTH, self.body.len(), CRLF);
        }

        // Empty line to separate headers from body
        head.push_str(CRLF);

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Serialize and flush the response; a response is sent exactly once
    pub fn send<W: Write>(self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.to_bytes())?;
        out.flush()
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_display() {
        assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        assert_eq!(StatusCode::LengthRequired.to_string(), "411 Length Required");
        assert_eq!(StatusCode::SwitchingProtocols.to_string(), "101 Switching Protocols");
    }

    #[test]
    fn test_response_creation() {
        let response = HttpResponse::ok().text("Hello, World!");

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body_bytes(), b"Hello, World!");
        assert_eq!(response.header_value("content-type"), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_in_place_mutation() {
        let mut response = HttpResponse::ok();
        response.set_status(StatusCode::Created);
        response.set_body(content_types::JSON, r#"{"id":1}"#);
        response.write_body(b" ");
        assert_eq!(response.status(), StatusCode::Created);
        assert_eq!(response.body_bytes(), br#"{"id":1} "#);

        response.clear_body();
        assert!(response.body_bytes().is_empty());
        assert!(response.header_value("Content-Type").is_none());
    }

    #[test]
    fn test_response_serialization() {
        let response = HttpResponse::ok().text("Hello");

        let bytes = response.to_bytes();
        let response_str = String::from_utf8(bytes).unwrap();

        assert!(response_str.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response_str.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(response_str.contains("Content-Length: 5\r\n"));
        assert!(response_str.contains("Connection: close\r\n"));
        assert!(response_str.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn test_custom_reason_phrase() {
        let mut response = HttpResponse::new(StatusCode::BadRequest);
        response.set_reason("Cannot parse header.");
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 400 Cannot parse header.\r\n"));

        response.set_reason("split\r\nX-Injected: 1");
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 400 split  X-Injected: 1\r\n"));
    }

    #[test]
    fn test_status_change_drops_custom_reason() {
        let mut response = HttpResponse::not_found();
        response.set_reason("Not Found");
        response.set_status(StatusCode::Found);
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 302 Found\r\n"));
    }

    #[test]
    fn test_switching_protocols_has_no_length() {
        let mut response = HttpResponse::new(StatusCode::SwitchingProtocols);
        response.set_header("Connection", "Upgrade");
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(!text.contains("Content-Length"));
        assert!(text.contains("Connection: Upgrade\r\n"));
        assert!(!text.contains("Connection: close"));
    }

    #[test]
    fn test_send_writes_everything() {
        let mut out = Vec::new();
        HttpResponse::not_found().text("nope").send(&mut out).unwrap();
        assert!(out.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
        assert!(out.ends_with(b"nope"));
    }
}
