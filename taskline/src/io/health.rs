//! Health snapshot writer (`var/health.json`).
//!
//! The snapshot is "most recent known state", not history: every report
//! overwrites the previous file atomically and stamps its own timestamp.
//! Unlike journal appends there is no soft fallback here — a health file
//! that silently goes stale would lie to external monitoring.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::io::atomic::write_atomic_bytes;

/// Most recent known driver state, consumed by external monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// RFC3339 timestamp with nanoseconds, set at write time.
    pub ts: String,
    /// Turn the driver most recently completed or attempted.
    pub turn: u64,
    /// Step that ran (or was about to run).
    pub step: String,
    /// False when the turn ended in an error.
    pub ok: bool,
    /// Error text, empty when `ok`.
    pub error: String,
}

/// Write a fresh snapshot with `ts` set to now.
pub fn write_health(path: &Path, turn: u64, step: &str, ok: bool, error: &str) -> Result<HealthSnapshot> {
    let snapshot = HealthSnapshot {
        ts: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        turn,
        step: step.to_string(),
        ok,
        error: error.to_string(),
    };
    let mut buf = serde_json::to_string(&snapshot).context("serialize health snapshot")?;
    buf.push('\n');
    write_atomic_bytes(path, buf.as_bytes(), false)
        .with_context(|| format!("write health snapshot {}", path.display()))?;
    Ok(snapshot)
}

/// Read the current snapshot (for `taskline status`).
pub fn read_health(path: &Path) -> Result<HealthSnapshot> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("read health snapshot {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parse health snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("var/health.json");

        let written = write_health(&path, 5, "REVIEW", true, "").expect("write");
        let read = read_health(&path).expect("read");

        assert_eq!(read, written);
        assert_eq!(read.turn, 5);
        assert!(read.ok);
        assert!(!read.ts.is_empty());
    }

    #[test]
    fn snapshot_is_overwritten_not_appended() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("health.json");

        write_health(&path, 1, "PICK", true, "").expect("first");
        write_health(&path, 2, "IMPLEMENT", false, "agent timed out").expect("second");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents.lines().count(), 1, "single-line snapshot");
        let snapshot = read_health(&path).expect("read snapshot");
        assert_eq!(snapshot.turn, 2);
        assert!(!snapshot.ok);
        assert_eq!(snapshot.error, "agent timed out");
    }

    #[test]
    fn wire_format_is_compact_with_expected_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("health.json");

        write_health(&path, 3, "DONE", true, "").expect("write");

        let contents = std::fs::read_to_string(&path).expect("read");
        let line = contents.trim_end();
        assert!(line.starts_with("{\"ts\":\""));
        assert!(line.contains("\"turn\":3"));
        assert!(line.contains("\"step\":\"DONE\""));
        assert!(line.contains("\"ok\":true"));
        assert!(line.ends_with("\"error\":\"\"}"));
    }
}
