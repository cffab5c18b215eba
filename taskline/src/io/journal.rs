//! Append-only NDJSON journal of transition records.
//!
//! One compact JSON object per line, one line per transition attempt.
//! Appends favor availability over strictness: validation issues and fsync
//! failures are logged, not fatal, unless configuration promotes fsync
//! failures to hard errors.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::warn;

use crate::core::journal::{JournalEntry, normalize_entry, validate_entry};

/// Whether an append reached stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Line written, flushed, and fsynced.
    Synced,
    /// Line written and flushed, but the fsync failed (soft durability).
    SyncFailed,
}

/// Result of a single append: the normalized entry as written, plus the
/// durability tier it achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    pub entry: JournalEntry,
    pub durability: Durability,
}

/// Appends normalized records to a single append-only file.
///
/// Each append is an independent open/write/close cycle. Within one process
/// sequential appends are ordered by call order; there is no cross-process
/// mutual exclusion, so multi-process writers must serialize externally.
#[derive(Debug, Clone)]
pub struct JournalWriter {
    path: PathBuf,
    validate: bool,
    strict_fsync: bool,
}

impl JournalWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            validate: true,
            strict_fsync: false,
        }
    }

    /// Enable or disable soft validation of entries before appending.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Promote fsync failures from warnings to hard errors.
    pub fn with_strict_fsync(mut self, strict: bool) -> Self {
        self.strict_fsync = strict;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalize `raw` and append it as one NDJSON line.
    ///
    /// Validation issues are logged at WARN and never block or alter the
    /// payload. A failed fsync is soft (the write and flush already
    /// succeeded) unless `strict_fsync` is set.
    pub fn append(&self, raw: &Value) -> Result<AppendOutcome> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let entry = normalize_entry(raw, &now);

        if self.validate {
            for issue in validate_entry(&entry) {
                warn!(path = %self.path.display(), issue = %issue, "journal entry failed validation");
            }
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create journal directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open journal {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        let line = serde_json::to_string(&entry).context("serialize journal entry")?;
        writeln!(writer, "{line}")
            .with_context(|| format!("append journal line {}", self.path.display()))?;
        writer
            .flush()
            .with_context(|| format!("flush journal {}", self.path.display()))?;

        let durability = match writer.get_ref().sync_all() {
            Ok(()) => Durability::Synced,
            Err(err) if self.strict_fsync => {
                return Err(err)
                    .with_context(|| format!("sync journal {}", self.path.display()));
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    err = %err,
                    "journal fsync failed; append kept (soft durability)"
                );
                Durability::SyncFailed
            }
        };

        Ok(AppendOutcome { entry, durability })
    }

    /// Append a fully formed entry produced by the driver.
    pub fn append_entry(&self, entry: &JournalEntry) -> Result<AppendOutcome> {
        let raw = serde_json::to_value(entry).context("encode journal entry")?;
        self.append(&raw)
    }
}
