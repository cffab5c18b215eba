//! Atomic single-file writes (same-directory temp file + rename).
//!
//! A reader never observes a partial write: the payload lands in a uniquely
//! named temp file next to the target, then an atomic rename replaces the
//! target. Same-directory placement keeps the rename on one
//! filesystem/volume, which is what makes the rename atomic. On failure the
//! temp file is removed and the target is either fully intact or fully
//! updated, never in between.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::Builder;
use thiserror::Error;

/// Failure taxonomy for atomic writes.
///
/// Every variant is terminal for the call; retry policy belongs to the
/// caller. The temp artifact is cleaned up before the error returns.
#[derive(Debug, Error)]
pub enum AtomicWriteError {
    #[error("create directory {path}: {source}")]
    DirectoryCreateFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("create temp file in {dir}: {source}")]
    TempFileCreateFailed {
        dir: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write temp file for {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sync temp file for {path}: {source}")]
    SyncFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rename temp file onto {path}: {source}")]
    RenameFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Write text atomically, normalizing CRLF to LF and guaranteeing a
/// trailing newline.
pub fn write_atomic_text(path: &Path, text: &str, sync: bool) -> Result<(), AtomicWriteError> {
    let normalized = normalize_text(text);
    write_atomic_bytes(path, normalized.as_bytes(), sync)
}

/// Write raw bytes atomically. Structured payloads (JSON and friends)
/// bypass newline normalization.
pub fn write_atomic_bytes(path: &Path, bytes: &[u8], sync: bool) -> Result<(), AtomicWriteError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|source| AtomicWriteError::DirectoryCreateFailed {
        path: dir.display().to_string(),
        source,
    })?;

    let mut tmp = Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)
        .map_err(|source| AtomicWriteError::TempFileCreateFailed {
            dir: dir.display().to_string(),
            source,
        })?;

    // From here on, dropping `tmp` (on any error path) removes the temp file.
    tmp.write_all(bytes)
        .map_err(|source| AtomicWriteError::WriteFailed {
            path: path.display().to_string(),
            source,
        })?;
    if sync {
        tmp.as_file()
            .sync_all()
            .map_err(|source| AtomicWriteError::SyncFailed {
                path: path.display().to_string(),
                source,
            })?;
    }

    tmp.persist(path).map_err(|err| AtomicWriteError::RenameFailed {
        path: path.display().to_string(),
        source: err.error,
    })?;
    Ok(())
}

/// CRLF -> LF, plus a guaranteed trailing LF.
pub fn normalize_text(text: &str) -> String {
    let mut out = text.replace("\r\n", "\n");
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
