//! Decoded form data: parameters and uploaded files
//!
//! Both `application/x-www-form-urlencoded` and `multipart/form-data` bodies
//! end up here. Parameters keep every occurrence of a key; uploaded files are
//! referenced by their temp-storage path, never held in memory.

use std::path::{Path, PathBuf};

/// Ordered key/value pairs where a key may repeat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    pairs: Vec<(String, String)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair; an existing key is never overwritten
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// First value recorded for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Every value recorded for `key`, in arrival order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A file part received through a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFile {
    /// Form field name
    pub name: String,
    /// Filename as sent by the client
    pub original_file_name: String,
    pub content_type: String,
    /// Where the bytes were spilled; deleted after dispatch
    pub temp_path: PathBuf,
}

impl HttpFile {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }
}

/// Uploaded files of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpFileCollection {
    files: Vec<HttpFile>,
}

impl HttpFileCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// File uploaded under the form field `name` (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&HttpFile> {
        self.files.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn add(&mut self, file: HttpFile) {
        self.files.push(file);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HttpFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Temp-storage paths of every file
    pub fn temp_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.temp_path.clone()).collect()
    }
}

/// Parameters and files decoded from a form body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedData {
    pub parameters: Parameters,
    pub files: HttpFileCollection,
}

impl DecodedData {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Decode `a=1&b=2` style text into `params`
///
/// `+` stands for a space; a piece without `=` yields an empty value; empty
/// pieces (`a=1&&b=2`) are skipped.
pub fn decode_urlencoded(text: &str, params: &mut Parameters) {
    for piece in text.split('&') {
        if piece.is_empty() {
            continue;
        }
        let (key, value) = piece.split_once('=').unwrap_or((piece, ""));
        params.add(url_decode(key), url_decode(value));
    }
}

/// Percent-decode a form component, tolerating malformed input
pub fn url_decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes()))
            .into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple_pairs() {
        let mut params = Parameters::new();
        decode_urlencoded("a=1&b=2", &mut params);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("2"));
    }

    #[test]
    fn test_duplicate_keys_accumulate() {
        let mut params = Parameters::new();
        decode_urlencoded("a=1&a=2", &mut params);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get_all("a").collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(params.get("a"), Some("1"));
    }

    #[test]
    fn test_percent_and_plus_decoding() {
        let mut params = Parameters::new();
        decode_urlencoded("greeting=hello+world%21&na%C3%AFve=caf%C3%A9", &mut params);
        assert_eq!(params.get("greeting"), Some("hello world!"));
        assert_eq!(params.get("naïve"), Some("café"));
    }

    #[test]
    fn test_missing_value_and_empty_pieces() {
        let mut params = Parameters::new();
        decode_urlencoded("flag&&x=", &mut params);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get("x"), Some(""));
    }

    #[test]
    fn test_value_containing_equals() {
        let mut params = Parameters::new();
        decode_urlencoded("expr=a=b", &mut params);
        assert_eq!(params.get("expr"), Some("a=b"));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        assert_eq!(url_decode("%FFok"), "\u{FFFD}ok");
    }

    #[test]
    fn test_file_collection_lookup() {
        let mut files = HttpFileCollection::new();
        files.add(HttpFile {
            name: "Avatar".into(),
            original_file_name: "me.png".into(),
            content_type: "image/png".into(),
            temp_path: PathBuf::from("/tmp/me.png"),
        });
        assert!(files.contains("avatar"));
        assert_eq!(files.get("AVATAR").map(|f| f.original_file_name.as_str()), Some("me.png"));
        assert_eq!(files.temp_paths(), vec![PathBuf::from("/tmp/me.png")]);
    }
}
