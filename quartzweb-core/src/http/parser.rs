//! Start-line and header parsing
//!
//! The parser walks `StartLine -> Headers -> Body` over a [`RequestReader`].
//! All per-request state (the partially built request, the last header seen
//! for continuation lines) lives in the parser value, which is created once per
//! connection and handed from stage to stage.

use std::io::Read;

use super::constants::headers;
use super::reader::{RequestReader, StreamEnd};
use super::request::{parse_cookies, HttpMethod, HttpRequest, HttpVersion};
use super::HttpError;

/// Where the parser currently is within the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StartLine,
    Headers,
    Body,
}

/// Why a request could not be taken further
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// The start line was unusable, so there is no request to answer
    Malformed(String),
    /// The peer went away or the stream failed
    Lost(StreamEnd),
    /// A fault that is answered with its own status
    Fault(HttpError),
}

impl From<HttpError> for ParseFailure {
    fn from(err: HttpError) -> Self {
        ParseFailure::Fault(err)
    }
}

impl From<StreamEnd> for ParseFailure {
    fn from(end: StreamEnd) -> Self {
        match end {
            StreamEnd::LineTooLong => {
                ParseFailure::Fault(HttpError::BadRequest("Line too long.".to_string()))
            }
            end => ParseFailure::Lost(end),
        }
    }
}

/// Incremental request parser owning the connection's reader
#[derive(Debug)]
pub struct RequestParser<S> {
    reader: RequestReader<S>,
    state: ParseState,
    request: Option<HttpRequest>,
    last_header: Option<String>,
    max_body_size: u64,
}

impl<S: Read> RequestParser<S> {
    pub fn new(reader: RequestReader<S>, max_body_size: u64) -> Self {
        Self { reader, state: ParseState::StartLine, request: None, last_header: None, max_body_size }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Parse the start line and headers, then validate the declared length
    ///
    /// On success the parser is in [`ParseState::Body`] and the reader sits on
    /// the first body byte. On a [`ParseFailure::Fault`] the partially built
    /// request is still available through [`take_request`](Self::take_request).
    pub fn parse_head(&mut self) -> Result<(), ParseFailure> {
        while self.state != ParseState::Body {
            let line = self.reader.read_line()?;
            match self.state {
                ParseState::StartLine => {
                    let request = parse_start_line(&line)?;
                    log::debug!("{} {} {}", request.method(), request.target(), request.version());
                    self.request = Some(request);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers if line.is_empty() => self.state = ParseState::Body,
                ParseState::Headers => self.parse_header_line(&line)?,
                ParseState::Body => break,
            }
        }

        let Some(request) = self.request.as_mut() else {
            return Err(ParseFailure::Malformed("no start line".to_string()));
        };

        if let Some(cookie_header) = request.header(headers::COOKIE) {
            let cookies = parse_cookies(cookie_header);
            request.set_cookies(cookies);
        }

        check_content_length(request, self.max_body_size)?;
        Ok(())
    }

    fn parse_header_line(&mut self, line: &str) -> Result<(), HttpError> {
        let Some(request) = self.request.as_mut() else {
            return Err(HttpError::BadRequest("Invalid header format.".to_string()));
        };

        if line.starts_with(' ') {
            // Continuation of the previous header, appended verbatim
            let appended = match &self.last_header {
                Some(name) => request.headers_mut().append_to(name, line),
                None => false,
            };
            if !appended {
                return Err(HttpError::BadRequest("Invalid header format.".to_string()));
            }
            return Ok(());
        }

        let (name, value) = split_header(line)
            .ok_or_else(|| HttpError::BadRequest("Cannot parse header.".to_string()))?;
        request.headers_mut().set(name, value.trim());
        self.last_header = Some(name.to_string());
        Ok(())
    }

    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_ref()
    }

    pub fn request_mut(&mut self) -> Option<&mut HttpRequest> {
        self.request.as_mut()
    }

    pub fn take_request(&mut self) -> Option<HttpRequest> {
        self.request.take()
    }

    pub fn reader_mut(&mut self) -> &mut RequestReader<S> {
        &mut self.reader
    }

    /// Split into the built request and the reader
    pub fn into_parts(self) -> (Option<HttpRequest>, RequestReader<S>) {
        (self.request, self.reader)
    }
}

/// Parse `METHOD SP target SP HTTP/d.d`
///
/// Runs of spaces between the parts are accepted; the `HTTP` token is matched
/// case-insensitively.
pub fn parse_start_line(line: &str) -> Result<HttpRequest, ParseFailure> {
    let malformed = || ParseFailure::Malformed(format!("Invalid request line: {:?}", line));

    let mut parts = line.split(' ').filter(|p| !p.is_empty());
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    if line.starts_with(' ') || line.ends_with(' ') {
        return Err(malformed());
    }
    if !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(malformed());
    }
    let method: HttpMethod = method.parse().map_err(|_| malformed())?;

    let version = match version.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("HTTP/") => &version[5..],
        _ => return Err(malformed()),
    };
    let version: HttpVersion = version.parse().map_err(|_| malformed())?;

    Ok(HttpRequest::new(method, target, version))
}

/// Split `Name: value`; the name must start with a letter and contain only
/// letters, digits and `-`
fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let mut bytes = name.bytes();
    let first_is_letter = bytes.next().is_some_and(|b| b.is_ascii_alphabetic());
    if !first_is_letter || !bytes.all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return None;
    }
    Some((name, value))
}

/// Content-Length is mandatory and bounded whenever a Content-Type is present
fn check_content_length(request: &mut HttpRequest, max_body_size: u64) -> Result<(), HttpError> {
    if !request.headers().contains(headers::CONTENT_TYPE) {
        return Ok(());
    }

    let declared: u64 = request
        .header(headers::CONTENT_LENGTH)
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or(HttpError::LengthRequired)?;

    if declared > max_body_size {
        return Err(HttpError::EntityTooLarge { declared, limit: max_body_size });
    }

    request.set_content_length(declared);
    Ok(())
}
