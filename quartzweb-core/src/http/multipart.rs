//! `multipart/form-data` decoding
//!
//! The body is split into elements at `CRLF--boundary` delimiters. Element
//! headers are read line by line; payloads are scanned byte by byte so that
//! file parts stream straight into temp storage without ever being held in
//! memory. A delimiter straddling two reads is carried over by leaving its
//! partially matched prefix unconsumed in the reader and asking for more.

use std::io::{Read, Write};
use std::path::PathBuf;

use super::form::{url_decode, DecodedData, HttpFile};
use super::parser::ParseFailure;
use super::reader::{RequestReader, StreamEnd};
use super::HttpError;
use crate::storage::{strip_path, FileSink, TempFileGuard};

/// Extract the `boundary` parameter from a multipart Content-Type
///
/// Surrounding quotes are removed; an empty boundary counts as absent.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Outcome of scanning one window of bytes for the delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Full delimiter starting at this offset
    Found(usize),
    /// The window ends with a delimiter prefix starting at this offset;
    /// bytes from here on must be kept until more arrive
    Partial(usize),
    /// No delimiter and no pending prefix
    NotFound,
}

/// Byte-level matcher for `CR LF - - boundary`
///
/// Only the complete delimiter ends a payload, so a part may itself contain
/// `CR LF - -` followed by other text (`line1\r\n--not boundary` stays whole).
/// Bodies whose parts never contain `CR LF - -` outside a delimiter decode
/// exactly as with a bare four-byte search.
#[derive(Debug, Clone)]
pub struct DelimiterMatcher {
    pattern: Vec<u8>,
}

impl DelimiterMatcher {
    pub fn new(boundary: &str) -> Self {
        let mut pattern = b"\r\n--".to_vec();
        pattern.extend(latin1_bytes(boundary));
        Self { pattern }
    }

    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    pub fn scan(&self, window: &[u8]) -> Scan {
        let mut from = 0;
        while let Some(offset) = window[from..].iter().position(|&b| b == b'\r') {
            let at = from + offset;
            let rest = &window[at..];
            if rest.len() >= self.pattern.len() {
                if rest.starts_with(&self.pattern) {
                    return Scan::Found(at);
                }
            } else if self.pattern.starts_with(rest) {
                return Scan::Partial(at);
            }
            from = at + 1;
        }
        Scan::NotFound
    }
}

/// One part between two delimiters, before it is folded into the form data
#[derive(Debug, Default)]
struct Element {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
}

/// Where an element's payload bytes go
enum Payload {
    Text(Vec<u8>),
    File { sink: FileSink, path: PathBuf },
    /// File input left empty by the client
    Discard,
}

impl Payload {
    fn write(&mut self, bytes: &[u8]) -> Result<(), HttpError> {
        match self {
            Payload::Text(text) => text.extend_from_slice(bytes),
            Payload::File { sink, path } => sink.write_all(bytes).map_err(|e| {
                HttpError::Internal(format!("writing upload {}: {}", path.display(), e))
            })?,
            Payload::Discard => {}
        }
        Ok(())
    }
}

/// How the payload of an element ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimited {
    /// Another element follows
    Next,
    /// Closing `--boundary--` seen
    Terminal,
    /// Something other than a delimiter line, or the body ran out
    QuietEnd,
}

/// Multipart decoder state for one request body
pub struct MultipartDecoder<'a, S> {
    reader: &'a mut RequestReader<S>,
    boundary: String,
    matcher: DelimiterMatcher,
    uploads: &'a mut TempFileGuard,
    data: DecodedData,
}

impl<'a, S: Read> MultipartDecoder<'a, S> {
    pub fn new(reader: &'a mut RequestReader<S>, boundary: &str, uploads: &'a mut TempFileGuard) -> Self {
        Self {
            reader,
            boundary: boundary.to_string(),
            matcher: DelimiterMatcher::new(boundary),
            uploads,
            data: DecodedData::new(),
        }
    }

    /// Decode every element until the closing delimiter or the end of the body
    pub fn decode(mut self) -> Result<DecodedData, ParseFailure> {
        let mut next = match self.read_first_boundary()? {
            Some(next) => next,
            None => return Ok(self.data),
        };

        while next == Delimited::Next {
            let Some(element) = self.read_element_headers()? else {
                break;
            };
            next = self.read_element(element)?;
        }

        Ok(self.data)
    }

    /// Line-based search for the opening delimiter
    fn read_first_boundary(&mut self) -> Result<Option<Delimited>, ParseFailure> {
        let line = loop {
            match self.reader.read_line() {
                Ok(line) if line.is_empty() => continue,
                Ok(line) => break line,
                Err(StreamEnd::BodyComplete) => return Ok(None),
                Err(end) => return Err(end.into()),
            }
        };

        if !line.starts_with("--") {
            log::debug!("Multipart body does not open with a delimiter, ignoring it");
            return Ok(None);
        }
        if line.trim_end().ends_with(self.boundary.as_str()) {
            Ok(Some(Delimited::Next))
        } else {
            Ok(Some(Delimited::Terminal))
        }
    }

    /// Element header lines up to the blank line; `None` if the body ended
    fn read_element_headers(&mut self) -> Result<Option<Element>, ParseFailure> {
        let mut element = Element::default();
        loop {
            let line = match self.reader.read_line() {
                Ok(line) => line,
                Err(StreamEnd::BodyComplete) => return Ok(None),
                Err(end) => return Err(end.into()),
            };
            if line.is_empty() {
                return Ok(Some(element));
            }

            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("Content-Disposition") {
                for (key, param) in disposition_params(value) {
                    match key.as_str() {
                        "name" => element.name = Some(param),
                        "filename" => element.filename = Some(strip_path(&fix_utf8(&param)).to_string()),
                        _ => {}
                    }
                }
            } else if name.trim().eq_ignore_ascii_case("Content-Type") {
                element.content_type = Some(value.trim().to_string());
            }
        }
    }

    /// Stream one element's payload and fold it into the form data
    fn read_element(&mut self, element: Element) -> Result<Delimited, ParseFailure> {
        let name = match element.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(HttpError::BadRequest(
                    "Error parsing request. Missing value name.".to_string(),
                )
                .into())
            }
        };

        let mut payload = match element.filename.as_deref() {
            None => Payload::Text(Vec::new()),
            Some("") => Payload::Discard,
            Some(filename) => {
                if element.content_type.as_deref().map_or(true, str::is_empty) {
                    return Err(HttpError::BadRequest(format!(
                        "Error parsing request. Value '{}' lacks a content type.",
                        name
                    ))
                    .into());
                }
                let path = self.uploads.allocate(filename).map_err(|e| {
                    HttpError::Internal(format!("allocating upload {}: {}", filename, e))
                })?;
                let sink = self.uploads.store().open_sink(&path).map_err(|e| {
                    HttpError::Internal(format!("opening upload {}: {}", path.display(), e))
                })?;
                Payload::File { sink, path }
            }
        };

        let ended = self.stream_payload(&mut payload)?;

        match payload {
            Payload::Text(bytes) => {
                let value = String::from_utf8_lossy(&bytes).into_owned();
                self.data.parameters.add(url_decode(&name), value);
            }
            Payload::File { mut sink, path } => {
                sink.flush().map_err(|e| {
                    HttpError::Internal(format!("flushing upload {}: {}", path.display(), e))
                })?;
                self.data.files.add(HttpFile {
                    name,
                    original_file_name: element.filename.unwrap_or_default(),
                    content_type: element.content_type.unwrap_or_default(),
                    temp_path: path,
                });
            }
            Payload::Discard => {}
        }

        Ok(ended)
    }

    /// Copy bytes into `payload` until the next delimiter
    fn stream_payload(&mut self, payload: &mut Payload) -> Result<Delimited, ParseFailure> {
        let mut carrying = false;

        loop {
            let window = if carrying { self.reader.fill_more() } else { self.reader.fill_buf() };
            let (scan, used) = match window {
                Ok(window) => {
                    let scan = self.matcher.scan(window);
                    let used = match scan {
                        Scan::Found(at) | Scan::Partial(at) => at,
                        Scan::NotFound => window.len(),
                    };
                    payload.write(&window[..used])?;
                    (scan, used)
                }
                Err(StreamEnd::BodyComplete) => {
                    // Declared length reached without a delimiter
                    let rest = self.reader.buffered().len();
                    payload.write(self.reader.buffered())?;
                    self.reader.consume(rest);
                    return Ok(Delimited::QuietEnd);
                }
                Err(end) => return Err(ParseFailure::Lost(end)),
            };

            match scan {
                Scan::Found(at) => {
                    self.reader.consume(at + self.matcher.len());
                    return self.read_delimiter_tail();
                }
                Scan::Partial(_) => {
                    self.reader.consume(used);
                    carrying = true;
                }
                Scan::NotFound => {
                    self.reader.consume(used);
                    carrying = false;
                }
            }
        }
    }

    /// Rest of the delimiter line: `--` closes the body, blank means another part
    fn read_delimiter_tail(&mut self) -> Result<Delimited, ParseFailure> {
        match self.reader.read_line() {
            Ok(tail) if tail.starts_with("--") => Ok(Delimited::Terminal),
            Ok(tail) if tail.trim().is_empty() => Ok(Delimited::Next),
            Ok(tail) => {
                log::debug!("Unexpected text after multipart delimiter: {:?}", tail);
                Ok(Delimited::QuietEnd)
            }
            Err(StreamEnd::BodyComplete) => Ok(Delimited::QuietEnd),
            Err(end) => Err(end.into()),
        }
    }
}

/// Parameters of a Content-Disposition value, keys lowercased
///
/// Quoted values run to the next `"` and may contain `;`.
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let Some((_, rest)) = value.split_once(';') else {
        return params;
    };

    let mut chars = rest.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(' ' | '\t' | ';')) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ';' {
                break;
            }
            key.push(c);
            chars.next();
        }

        let mut param = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            while matches!(chars.peek(), Some(' ' | '\t')) {
                chars.next();
            }
            if chars.peek() == Some(&'"') {
                chars.next();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    param.push(c);
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == ';' {
                        break;
                    }
                    param.push(c);
                    chars.next();
                }
                param = param.trim_end().to_string();
            }
        }

        params.push((key.trim().to_ascii_lowercase(), param));
    }
    params
}

/// Header text is read one byte per char; recover UTF-8 from those bytes
fn fix_utf8(text: &str) -> String {
    String::from_utf8_lossy(&latin1_bytes(text)).into_owned()
}

fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DiskTempStore, TempFileStore};
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Arc;

    struct Chunks(VecDeque<Vec<u8>>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(mut chunk) = self.0.pop_front() else { return Ok(0) };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.0.push_front(chunk.split_off(n));
            }
            Ok(n)
        }
    }

    fn decode_chunks(
        chunks: Vec<Vec<u8>>,
        boundary: &str,
        store: Arc<dyn TempFileStore>,
    ) -> (Result<DecodedData, ParseFailure>, TempFileGuard) {
        let length: usize = chunks.iter().map(Vec::len).sum();
        let mut reader = RequestReader::new(Chunks(chunks.into()), 64);
        reader.begin_body(length as u64);
        let mut guard = TempFileGuard::new(store);
        let result = MultipartDecoder::new(&mut reader, boundary, &mut guard).decode();
        (result, guard)
    }

    fn store() -> (tempfile::TempDir, Arc<dyn TempFileStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DiskTempStore::new(dir.path()).unwrap());
        (dir, store)
    }

    #[test]
    fn test_extract_boundary() {
        assert_eq!(extract_boundary("multipart/form-data; boundary=abc").as_deref(), Some("abc"));
        assert_eq!(
            extract_boundary("multipart/form-data; charset=utf-8; Boundary=\"x y\"").as_deref(),
            Some("x y")
        );
        assert_eq!(extract_boundary("multipart/form-data"), None);
        assert_eq!(extract_boundary("multipart/form-data; boundary="), None);
    }

    #[test]
    fn test_matcher_found_and_partial() {
        let matcher = DelimiterMatcher::new("XY");
        assert_eq!(matcher.scan(b"data\r\n--XY\r\n"), Scan::Found(4));
        assert_eq!(matcher.scan(b"data\r"), Scan::Partial(4));
        assert_eq!(matcher.scan(b"data\r\n--X"), Scan::Partial(4));
        assert_eq!(matcher.scan(b"data\r\n--Z"), Scan::NotFound);
        // A lone CR LF inside the payload is data
        assert_eq!(matcher.scan(b"a\r\nb\r\n--XY"), Scan::Found(4));
    }

    #[test]
    fn test_disposition_params() {
        let params = disposition_params(r#" form-data; name="upload"; filename="a;b.txt""#);
        assert_eq!(
            params,
            vec![("name".to_string(), "upload".to_string()), ("filename".to_string(), "a;b.txt".to_string())]
        );

        // filename before name must not confuse the name lookup
        let params = disposition_params(r#"form-data; filename="f.txt"; name=field"#);
        assert_eq!(params[1], ("name".to_string(), "field".to_string()));
    }

    #[test]
    fn test_fix_utf8_recovers_multibyte() {
        // "é" sent as UTF-8, read back one byte per char
        let misread: String = "\u{00C3}\u{00A9}t\u{00C3}\u{00A9}.txt".to_string();
        assert_eq!(fix_utf8(&misread), "été.txt");
    }

    #[test]
    fn test_field_and_file() {
        let (dir, store) = store();
        let body = b"--B\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\r\n\
hello world\r\n\
--B\r\n\
Content-Disposition: form-data; name=\"doc\"; filename=\"C:\\\\tmp\\\\doc.bin\"\r\n\
Content-Type: application/octet-stream\r\n\r\n\
\x00\x01\r\n\x02\r\n--B--\r\n"
            .to_vec();
        let (result, guard) = decode_chunks(vec![body], "B", store);
        let data = result.unwrap();

        assert_eq!(data.parameters.get("title"), Some("hello world"));
        assert_eq!(data.files.len(), 1);
        let file = data.files.get("doc").unwrap();
        assert_eq!(file.original_file_name, "doc.bin");
        assert_eq!(file.content_type, "application/octet-stream");
        assert_eq!(std::fs::read(&file.temp_path).unwrap(), b"\x00\x01\r\n\x02");
        assert!(file.temp_path.starts_with(dir.path()));
        assert_eq!(guard.paths().len(), 1);
    }

    #[test]
    fn test_delimiter_split_across_reads() {
        let (_dir, store) = store();
        let chunks = vec![
            b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue\r".to_vec(),
            b"\n--B\r\nContent-Disposition: form-data; name=\"b\"\r\n\r\nsecond\r\n-".to_vec(),
            b"-B--\r\n".to_vec(),
        ];
        let (result, _guard) = decode_chunks(chunks, "B", store);
        let data = result.unwrap();
        assert_eq!(data.parameters.len(), 2);
        assert_eq!(data.parameters.get("a"), Some("value"));
        assert_eq!(data.parameters.get("b"), Some("second"));
    }

    #[test]
    fn test_false_prefix_is_payload() {
        let (_dir, store) = store();
        let chunks = vec![
            b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nx\r\n-".to_vec(),
            b"-C y\r\n--B--".to_vec(),
        ];
        let (result, _guard) = decode_chunks(chunks, "B", store);
        assert_eq!(result.unwrap().parameters.get("a"), Some("x\r\n--C y"));
    }

    #[test]
    fn test_dash_line_inside_file_is_kept() {
        let (_dir, store) = store();
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"n.txt\"\r\n\
Content-Type: text/plain\r\n\r\nline1\r\n--not boundary\r\n--B--\r\n"
            .to_vec();
        let (result, _guard) = decode_chunks(vec![body], "B", store);
        let data = result.unwrap();
        let file = data.files.get("f").unwrap();
        assert_eq!(std::fs::read(&file.temp_path).unwrap(), b"line1\r\n--not boundary");
    }

    #[test]
    fn test_non_delimiter_opening_line_is_quiet_end() {
        let (_dir, store) = store();
        let body = b"\r\n\r\nnot a boundary\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nv\r\n--B--".to_vec();
        let (result, _guard) = decode_chunks(vec![body], "B", store);
        let data = result.unwrap();
        assert!(data.parameters.is_empty());
        assert!(data.files.is_empty());
    }

    #[test]
    fn test_empty_filename_is_skipped() {
        let (_dir, store) = store();
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"\"\r\n\
Content-Type: application/octet-stream\r\n\r\n\r\n--B--\r\n"
            .to_vec();
        let (result, guard) = decode_chunks(vec![body], "B", store);
        let data = result.unwrap();
        assert!(data.files.is_empty());
        assert!(data.parameters.is_empty());
        assert!(guard.paths().is_empty());
    }

    #[test]
    fn test_missing_name_is_fatal() {
        let (_dir, store) = store();
        let body = b"--B\r\nContent-Disposition: form-data\r\n\r\nv\r\n--B--\r\n".to_vec();
        let (result, _guard) = decode_chunks(vec![body], "B", store);
        assert!(matches!(result, Err(ParseFailure::Fault(HttpError::BadRequest(_)))));
    }

    #[test]
    fn test_file_without_content_type_is_fatal() {
        let (_dir, store) = store();
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.txt\"\r\n\r\nv\r\n--B--\r\n".to_vec();
        let (result, guard) = decode_chunks(vec![body], "B", store);
        assert!(matches!(result, Err(ParseFailure::Fault(HttpError::BadRequest(_)))));
        assert!(guard.paths().is_empty());
    }

    #[test]
    fn test_body_ends_without_terminal_delimiter() {
        let (_dir, store) = store();
        let body = b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\ntruncated".to_vec();
        let (result, _guard) = decode_chunks(vec![body], "B", store);
        assert_eq!(result.unwrap().parameters.get("a"), Some("truncated"));
    }

    #[test]
    fn test_disconnect_mid_file_keeps_partial_tracked() {
        let (_dir, store) = store();
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"big.bin\"\r\n\
Content-Type: application/octet-stream\r\n\r\npartial"
            .to_vec();
        let mut reader = RequestReader::new(Chunks(vec![body].into()), 64);
        reader.begin_body(10_000);
        let mut guard = TempFileGuard::new(store);
        let result = MultipartDecoder::new(&mut reader, "B", &mut guard).decode();
        assert_eq!(result.unwrap_err(), ParseFailure::Lost(StreamEnd::Closed));

        let partial = guard.paths()[0].clone();
        assert!(partial.exists());
        drop(guard);
        assert!(!partial.exists());
    }

    #[test]
    fn test_duplicate_field_names_accumulate() {
        let (_dir, store) = store();
        let body = b"--B\r\nContent-Disposition: form-data; name=\"tag\"\r\n\r\na\r\n\
--B\r\nContent-Disposition: form-data; name=\"tag\"\r\n\r\nb\r\n--B--"
            .to_vec();
        let (result, _guard) = decode_chunks(vec![body], "B", store);
        let data = result.unwrap();
        assert_eq!(data.parameters.get_all("tag").collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
