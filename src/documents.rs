//! Local contract document directory.
//!
//! Backfill reads documents from a flat directory; extraction writes them
//! back to one, keyed by sanitized filename. Subdirectories are not
//! descended into.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::error::{Result, SyncError};

/// Characters removed from filenames before they touch the local disk.
const UNSAFE_FILENAME_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// A document file found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDocument {
    pub filename: String,
    pub path: PathBuf,
}

impl LocalDocument {
    /// Read the document body. Failure concerns this document only.
    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|source| SyncError::Document {
            path: self.path.clone(),
            source,
        })
    }
}

/// List documents in `dir` carrying the configured extension, sorted by
/// filename.
pub fn scan_documents(dir: &Path, docs: &DocumentsConfig) -> Result<Vec<LocalDocument>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            SyncError::local_io(&path, std::io::Error::other(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().to_string();
        if !docs.is_document(&filename) {
            continue;
        }

        found.push(LocalDocument {
            filename,
            path: entry.path().to_path_buf(),
        });
    }

    found.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(found)
}

/// Remove characters that are unsafe in local filenames.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !UNSAFE_FILENAME_CHARS.contains(c))
        .collect()
}

/// Create `dir` (and parents) if needed.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| SyncError::local_io(dir, e))
}

/// Write a document into `dir` under `filename`, replacing any existing file.
pub fn write_document(dir: &Path, filename: &str, body: &[u8]) -> Result<PathBuf> {
    let path = dir.join(filename);
    std::fs::write(&path, body).map_err(|e| SyncError::local_io(&path, e))?;
    Ok(path)
}
