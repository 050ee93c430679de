//! HTTP request representation
//!
//! A request is built incrementally by the parser: the start line creates it,
//! header lines fill in its [`HeaderMap`], and the body decoder attaches either
//! raw content or [`DecodedData`].

use std::net::SocketAddr;
use std::str::FromStr;

use super::form::{decode_urlencoded, DecodedData, HttpFileCollection, Parameters};
use super::headers::HeaderMap;
use super::HttpError;

/// HTTP methods recognised on the start line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    TRACE,
    CONNECT,
}

impl HttpMethod {
    /// Convert method to string
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::OPTIONS => "OPTIONS",
            HttpMethod::TRACE => "TRACE",
            HttpMethod::CONNECT => "CONNECT",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::GET),
            "HEAD" => Ok(HttpMethod::HEAD),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            "DELETE" => Ok(HttpMethod::DELETE),
            "PATCH" => Ok(HttpMethod::PATCH),
            "OPTIONS" => Ok(HttpMethod::OPTIONS),
            "TRACE" => Ok(HttpMethod::TRACE),
            "CONNECT" => Ok(HttpMethod::CONNECT),
            _ => Err(HttpError::BadRequest(format!("Unsupported HTTP method: {}", s))),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP version from the start line (`HTTP/<digit>.<digit>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl HttpVersion {
    pub const HTTP_1_0: HttpVersion = HttpVersion { major: 1, minor: 0 };
    pub const HTTP_1_1: HttpVersion = HttpVersion { major: 1, minor: 1 };
}

impl FromStr for HttpVersion {
    type Err = HttpError;

    /// Parses the part after `HTTP/`, e.g. `1.1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9'] => {
                Ok(HttpVersion { major: major - b'0', minor: minor - b'0' })
            }
            _ => Err(HttpError::BadRequest(format!("Unsupported HTTP version: {}", s))),
        }
    }
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// A cookie sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Split a `Cookie` header value into cookies
///
/// Pieces are separated by `;`, name and value by the first `=`; both sides are
/// trimmed. Order and duplicate names are preserved.
pub fn parse_cookies(header: &str) -> Vec<Cookie> {
    header
        .split(';')
        .filter_map(|piece| {
            let (name, value) = piece.split_once('=').unwrap_or((piece, ""));
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Cookie { name: name.to_string(), value: value.trim().to_string() })
        })
        .collect()
}

/// Body attached to a request after decoding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    /// No Content-Type, or an empty one
    #[default]
    None,
    /// Opaque content read verbatim
    Content(Vec<u8>),
    /// URL-encoded or multipart form
    Form(DecodedData),
}

/// Represents a complete HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: HttpMethod,
    target: String,
    version: HttpVersion,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    content_length: Option<u64>,
    body: RequestBody,
    remote_addr: Option<SocketAddr>,
}

impl HttpRequest {
    /// Create a request from its start line
    pub fn new(method: HttpMethod, target: impl Into<String>, version: HttpVersion) -> Self {
        Self {
            method,
            target: target.into(),
            version,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            content_length: None,
            body: RequestBody::None,
            remote_addr: None,
        }
    }

    // Accessors

    /// Get the HTTP method
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The request target exactly as sent, query included
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Get the request path (without query parameters)
    pub fn path(&self) -> &str {
        self.target.split_once('?').map(|(p, _)| p).unwrap_or(&self.target)
    }

    /// Decoded query parameters, duplicates kept
    pub fn query_params(&self) -> Parameters {
        let mut params = Parameters::new();
        if let Some((_, query)) = self.target.split_once('?') {
            decode_urlencoded(query, &mut params);
        }
        params
    }

    /// Get the HTTP version
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// Get all headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get a specific header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// First cookie with the given name
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.iter().find(|c| c.name == name).map(|c| c.value.as_str())
    }

    pub fn set_cookies(&mut self, cookies: Vec<Cookie>) {
        self.cookies = cookies;
    }

    /// Declared Content-Length, once validated
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn set_content_length(&mut self, length: u64) {
        self.content_length = Some(length);
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn set_body(&mut self, body: RequestBody) {
        self.body = body;
    }

    /// Raw content for bodies that are not forms
    pub fn content(&self) -> Option<&[u8]> {
        match &self.body {
            RequestBody::Content(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Decoded form data, if the body was a form
    pub fn decoded_data(&self) -> Option<&DecodedData> {
        match &self.body {
            RequestBody::Form(data) => Some(data),
            _ => None,
        }
    }

    /// Form parameters; empty when the body was not a form
    pub fn parameters(&self) -> Parameters {
        self.decoded_data().map(|d| d.parameters.clone()).unwrap_or_default()
    }

    /// Uploaded files; empty when the body was not multipart
    pub fn files(&self) -> HttpFileCollection {
        self.decoded_data().map(|d| d.files.clone()).unwrap_or_default()
    }

    /// Get the remote address (if available)
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Set the remote address
    pub fn set_remote_addr(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }
}
