//! Path → URI normalization.
//!
//! Existing filesystem entries become absolute `file://` URIs; anything else is
//! assumed to already be a URI the backend understands (`rtsp://`, `http://`, ...)
//! and is passed through untouched.

use std::path::{Path, PathBuf};

use url::Url;

/// Resolve a user-supplied path or URI into the URI handed to the backend.
///
/// Returns `None` for empty input.
pub fn resolve(input: &str) -> Option<String> {
    if input.trim().is_empty() {
        return None;
    }

    let path = Path::new(input);
    if !path.exists() {
        return Some(input.to_string());
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match Url::from_file_path(&absolute) {
        Ok(url) => Some(url.to_string()),
        Err(()) => {
            tracing::debug!(path = ?absolute, "path could not be expressed as a file URI");
            Some(input.to_string())
        }
    }
}

/// Map a `file://` URI (or a plain existing path) back to a local path.
pub fn to_local_path(uri: &str) -> Option<PathBuf> {
    if let Ok(url) = Url::parse(uri) {
        if url.scheme() == "file" {
            return url.to_file_path().ok();
        }
        // Single-letter schemes are Windows drive letters, not URIs.
        if url.scheme().len() > 1 {
            return None;
        }
    }
    let path = PathBuf::from(uri);
    path.exists().then_some(path)
}
