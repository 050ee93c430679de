//! Temp storage for uploaded file parts
//!
//! Multipart file payloads are streamed straight to disk while the body is
//! scanned. The pipeline only keeps the paths; after dispatch it hands them
//! back to [`TempFileStore::delete_files`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Upper bound on `- Copy (n)` candidates tried for one suggested name
const MAX_COPY_ATTEMPTS: u32 = 10_000;

/// Writable sink for one uploaded file
pub type FileSink = Box<dyn Write + Send>;

/// Storage collaborator used by the multipart decoder
pub trait TempFileStore: Send + Sync {
    /// Reserve a collision-free path for `suggested_name`
    ///
    /// The returned path exists (empty) once this returns, so two concurrent
    /// uploads of the same name never share a file.
    fn allocate(&self, suggested_name: &str) -> io::Result<PathBuf>;

    /// Open an allocated path for appending
    fn open_sink(&self, path: &Path) -> io::Result<FileSink>;

    /// Delete every path, continuing past failures
    ///
    /// Returns `false` if any delete failed.
    fn delete_files(&self, paths: &[PathBuf]) -> bool;

    /// Remove everything currently held by the store
    fn clear(&self) -> io::Result<()>;
}

/// [`TempFileStore`] backed by a directory on disk
#[derive(Debug, Clone)]
pub struct DiskTempStore {
    root: PathBuf,
}

impl DiskTempStore {
    /// Use `root` as the storage directory, creating it if absent
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn try_create(&self, file_name: &str) -> io::Result<Option<PathBuf>> {
        let candidate = self.root.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => Ok(Some(candidate)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl TempFileStore for DiskTempStore {
    fn allocate(&self, suggested_name: &str) -> io::Result<PathBuf> {
        let name = sanitize_file_name(suggested_name);
        if let Some(path) = self.try_create(&name)? {
            return Ok(path);
        }

        let (stem, extension) = split_extension(&name);
        for counter in 0..MAX_COPY_ATTEMPTS {
            let candidate = if counter == 0 {
                format!("{} - Copy{}", stem, extension)
            } else {
                format!("{} - Copy ({}){}", stem, counter, extension)
            };
            if let Some(path) = self.try_create(&candidate)? {
                log::debug!("Upload name {:?} taken, stored as {:?}", name, candidate);
                return Ok(path);
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free temp file name for {:?}", name),
        ))
    }

    fn open_sink(&self, path: &Path) -> io::Result<FileSink> {
        let file: File = OpenOptions::new().append(true).open(path)?;
        Ok(Box::new(file))
    }

    fn delete_files(&self, paths: &[PathBuf]) -> bool {
        let mut all_deleted = true;
        for path in paths {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    log::warn!("Failed to delete temp file {}: {}", path.display(), e);
                    all_deleted = false;
                }
            }
        }
        all_deleted
    }

    fn clear(&self) -> io::Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Temp files created while decoding one request
///
/// Every path is tracked as soon as it is allocated, so partially written
/// uploads are covered too. [`cleanup`](Self::cleanup) deletes them once;
/// dropping the guard cleans up anything still tracked.
pub struct TempFileGuard {
    store: Arc<dyn TempFileStore>,
    paths: Vec<PathBuf>,
}

impl TempFileGuard {
    pub fn new(store: Arc<dyn TempFileStore>) -> Self {
        Self { store, paths: Vec::new() }
    }

    pub fn store(&self) -> &dyn TempFileStore {
        self.store.as_ref()
    }

    /// Allocate a path through the store and track it
    pub fn allocate(&mut self, suggested_name: &str) -> io::Result<PathBuf> {
        let path = self.store.allocate(suggested_name)?;
        self.paths.push(path.clone());
        Ok(path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked file; later calls are no-ops
    ///
    /// Failures are logged and otherwise ignored.
    pub fn cleanup(&mut self) {
        let paths = std::mem::take(&mut self.paths);
        if paths.is_empty() {
            return;
        }
        if !self.store.delete_files(&paths) {
            log::warn!("Some of {} temp upload files could not be deleted", paths.len());
        }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for TempFileGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempFileGuard").field("paths", &self.paths).finish()
    }
}

/// Final path component of a client-supplied filename
///
/// Handles both `/` and `\` separators, so `C:\Users\me\a.txt` and
/// `\\host\share\a.txt` reduce to `a.txt`.
pub fn strip_path(name: &str) -> &str {
    name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name)
}

/// A filename safe to join onto the storage root
pub fn sanitize_file_name(name: &str) -> String {
    let base = strip_path(name).trim();
    if base.is_empty() || base.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        base.to_string()
    }
}

fn split_extension(name: &str) -> (String, String) {
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            (stem.to_string_lossy().into_owned(), format!(".{}", ext.to_string_lossy()))
        }
        _ => (name.to_string(), String::new()),
    }
}
