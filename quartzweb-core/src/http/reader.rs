//! Line/byte reader over the connection's inbound stream
//!
//! One buffer and one cursor serve both the line-oriented head of the request
//! and the raw body that follows, so bytes read ahead while looking for the end
//! of the headers are never lost. Once the body starts, reads from the stream
//! are capped at the declared Content-Length.

use std::io::{self, Read};

/// Why no more bytes can be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The declared body has been fully consumed
    BodyComplete,
    /// The peer closed the connection (zero-length read)
    Closed,
    /// A read failed; the connection is unusable
    Disconnected,
    /// A line grew past the reader's limit without a terminator
    LineTooLong,
}

impl StreamEnd {
    /// Whether the peer is gone and no response can be attempted
    pub fn is_connection_lost(self) -> bool {
        matches!(self, StreamEnd::Closed | StreamEnd::Disconnected)
    }
}

/// Buffered reader yielding text lines, then raw body bytes
#[derive(Debug)]
pub struct RequestReader<S> {
    stream: S,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    /// Body bytes not yet pulled from the stream; `None` until the body starts
    body_remaining: Option<u64>,
    end: Option<StreamEnd>,
    max_line_length: usize,
}

impl<S: Read> RequestReader<S> {
    pub fn new(stream: S, buffer_size: usize) -> Self {
        Self {
            stream,
            buf: vec![0; buffer_size.max(64)],
            pos: 0,
            filled: 0,
            body_remaining: None,
            end: None,
            max_line_length: super::DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Longest line accepted by [`read_line`](Self::read_line), terminator excluded
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Read one line, terminator (LF or CRLF) stripped
    ///
    /// Bytes map one-to-one onto chars (Latin-1), as header syntax is ASCII.
    /// A final unterminated line is still returned; the end is reported on the
    /// following call. A line longer than the configured maximum yields
    /// [`StreamEnd::LineTooLong`] once the limit is crossed, so a peer that never
    /// sends LF cannot grow it without bound.
    pub fn read_line(&mut self) -> Result<String, StreamEnd> {
        let mut line = Vec::new();

        loop {
            let (used, terminated) = match self.fill_buf() {
                Ok(available) => match available.iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        line.extend_from_slice(&available[..i]);
                        (i + 1, true)
                    }
                    None => {
                        line.extend_from_slice(available);
                        (available.len(), false)
                    }
                },
                Err(end) if line.is_empty() => return Err(end),
                Err(_) => break,
            };
            self.consume(used);
            if line.len() > self.max_line_length.saturating_add(1) {
                return Err(StreamEnd::LineTooLong);
            }
            if terminated {
                break;
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() > self.max_line_length {
            return Err(StreamEnd::LineTooLong);
        }
        Ok(line.iter().map(|&b| b as char).collect())
    }

    /// Switch to body mode with the declared length
    ///
    /// Bytes already buffered count towards the body; anything buffered past
    /// the declared length is discarded.
    pub fn begin_body(&mut self, content_length: u64) {
        let buffered = (self.filled - self.pos) as u64;
        if buffered >= content_length {
            self.filled = self.pos + content_length as usize;
            self.body_remaining = Some(0);
        } else {
            self.body_remaining = Some(content_length - buffered);
        }
    }

    /// Unconsumed bytes, refilling from the stream only when none are buffered
    pub fn fill_buf(&mut self) -> Result<&[u8], StreamEnd> {
        if self.pos == self.filled {
            self.pos = 0;
            self.filled = 0;
            self.refill()?;
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    /// Keep the unconsumed bytes and append more from the stream behind them
    ///
    /// This is how a partially matched delimiter is carried across refills:
    /// the caller leaves the candidate bytes unconsumed and asks for more.
    pub fn fill_more(&mut self) -> Result<&[u8], StreamEnd> {
        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }
        if self.filled == self.buf.len() {
            let grown = self.buf.len() * 2;
            self.buf.resize(grown, 0);
        }
        self.refill()?;
        Ok(&self.buf[self.pos..self.filled])
    }

    pub fn consume(&mut self, amount: usize) {
        self.pos = (self.pos + amount).min(self.filled);
    }

    /// Drain the rest of the body into `out`
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<(), StreamEnd> {
        loop {
            match self.fill_buf() {
                Ok(available) => {
                    out.extend_from_slice(available);
                    let used = available.len();
                    self.consume(used);
                }
                Err(StreamEnd::BodyComplete) => return Ok(()),
                Err(end) => return Err(end),
            }
        }
    }

    /// Bytes buffered but not yet consumed, without touching the stream
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..self.filled]
    }

    /// The end condition reached so far, if any
    pub fn end(&self) -> Option<StreamEnd> {
        self.end
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Give back the stream and any bytes read ahead but not consumed
    pub fn into_parts(self) -> (S, Vec<u8>) {
        let rest = self.buf[self.pos..self.filled].to_vec();
        (self.stream, rest)
    }

    fn refill(&mut self) -> Result<(), StreamEnd> {
        if let Some(end) = self.end {
            return Err(end);
        }

        let mut limit = self.buf.len();
        if let Some(remaining) = self.body_remaining {
            if remaining == 0 {
                return Err(self.finish(StreamEnd::BodyComplete));
            }
            let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
            limit = limit.min(self.filled.saturating_add(remaining));
        }

        loop {
            match self.stream.read(&mut self.buf[self.filled..limit]) {
                Ok(0) => return Err(self.finish(StreamEnd::Closed)),
                Ok(n) => {
                    self.filled += n;
                    if let Some(remaining) = self.body_remaining.as_mut() {
                        *remaining -= n as u64;
                    }
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("Read failed, dropping connection: {}", e);
                    return Err(self.finish(StreamEnd::Disconnected));
                }
            }
        }
    }

    fn finish(&mut self, end: StreamEnd) -> StreamEnd {
        self.end = Some(end);
        end
    }
}
