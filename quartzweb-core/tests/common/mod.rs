//! Shared harness for pipeline tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use quartzweb_core::http::{ConnectionOutcome, RequestProcessor, Router};
use quartzweb_core::storage::DiskTempStore;

/// In-memory connection whose reads return at most one scripted chunk each
pub struct ScriptedStream {
    chunks: Arc<Mutex<VecDeque<Vec<u8>>>>,
    written: Arc<Mutex<Vec<u8>>>,
    fail_at_end: bool,
}

/// Handles kept by the test after the stream moved into the processor
#[derive(Clone)]
pub struct StreamTap {
    chunks: Arc<Mutex<VecDeque<Vec<u8>>>>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedStream {
    pub fn new(chunks: Vec<Vec<u8>>) -> (Self, StreamTap) {
        let chunks = Arc::new(Mutex::new(VecDeque::from(chunks)));
        let written = Arc::new(Mutex::new(Vec::new()));
        let tap = StreamTap { chunks: Arc::clone(&chunks), written: Arc::clone(&written) };
        (Self { chunks, written, fail_at_end: false }, tap)
    }

    /// Report a reset instead of a clean close once the script runs out
    pub fn failing_at_end(mut self) -> Self {
        self.fail_at_end = true;
        self
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut chunks = self.chunks.lock().unwrap();
        let Some(mut chunk) = chunks.pop_front() else {
            if self.fail_at_end {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "scripted reset"));
            }
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StreamTap {
    /// Everything the server wrote, decoded lossily
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).into_owned()
    }

    /// Scripted chunks the server never asked for
    pub fn unread_chunks(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }
}

/// A processor over a fresh temp directory
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub processor: RequestProcessor,
}

impl Harness {
    pub fn new(router: Router) -> Self {
        Self::with_limit(router, 1_000_000)
    }

    pub fn with_limit(router: Router, max_body_size: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DiskTempStore::new(dir.path()).unwrap());
        let processor = RequestProcessor::new(Arc::new(router), store)
            .with_max_body_size(max_body_size)
            .with_read_buffer_size(256);
        Self { dir, processor }
    }

    /// Tighten the per-line limit of the underlying processor
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.processor = self.processor.with_max_line_length(max_line_length);
        self
    }

    pub fn run(&self, chunks: Vec<Vec<u8>>) -> (ConnectionOutcome, StreamTap) {
        let (stream, tap) = ScriptedStream::new(chunks);
        (self.processor.process(stream, None), tap)
    }

    /// Files left in the temp directory
    pub fn leftover_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Body of a serialized response (after the blank line)
pub fn response_body(written: &str) -> &str {
    written.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}
