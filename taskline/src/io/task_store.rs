//! State snapshot load/save with schema validation.
//!
//! `var/state.json` is the source of truth across process restarts. Loads
//! validate against the embedded JSON Schema before deserializing; saves go
//! through the atomic writer with fsync, so a crash mid-save leaves the
//! previous snapshot intact.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::task::{PersistedTaskData, Task};
use crate::io::atomic::write_atomic_bytes;

const STATE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/task_state/v1.schema.json"
));

/// Current state file format version.
pub const STATE_VERSION: u32 = 1;

/// Wire shape of `var/state.json`: the task snapshot plus the driver's
/// turn counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    pub turn: u64,
    pub task: PersistedTaskData,
}

/// Load and validate the task snapshot from disk.
///
/// Returns the reconstructed task and the persisted turn counter.
pub fn load_state(path: &Path) -> Result<(Task, u64)> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    validate_schema(&value)?;
    let state: StateFile = serde_json::from_value(value)
        .with_context(|| format!("deserialize state {}", path.display()))?;
    if state.version != STATE_VERSION {
        return Err(anyhow!(
            "unsupported state version {} in {} (expected {STATE_VERSION})",
            state.version,
            path.display()
        ));
    }
    Ok((Task::from_persisted(state.task), state.turn))
}

/// Atomically write the task snapshot, fsynced before the rename.
pub fn write_state(path: &Path, task: &Task, turn: u64) -> Result<()> {
    let state = StateFile {
        version: STATE_VERSION,
        turn,
        task: task.to_persisted(),
    };
    let mut buf = serde_json::to_string_pretty(&state).context("serialize state")?;
    buf.push('\n');
    write_atomic_bytes(path, buf.as_bytes(), true)
        .with_context(|| format!("write state {}", path.display()))
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(STATE_SCHEMA).context("parse embedded state schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid state schema: {err}"))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "state schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::{Status, Step};
    use crate::core::task::TaskType;

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("var/state.json");

        let mut task = Task::new(TaskType::Pbi, "Ship search", "Add search to the UI")
            .expect("new task");
        task.update_status(Status::Picked).expect("pick");
        write_state(&path, &task, 2).expect("write");

        let (loaded, turn) = load_state(&path).expect("load");
        assert_eq!(turn, 2);
        assert_eq!(loaded, task);
        assert_eq!(loaded.status(), Status::Picked);
        assert_eq!(loaded.step(), Step::Pick);
    }

    #[test]
    fn load_rejects_out_of_set_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");

        let task = Task::new(TaskType::Sbi, "Victim", "").expect("new task");
        write_state(&path, &task, 0).expect("write");

        let doctored = fs::read_to_string(&path)
            .expect("read")
            .replace("\"PENDING\"", "\"MAYBE\"");
        fs::write(&path, doctored).expect("rewrite");

        let err = load_state(&path).unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn load_rejects_unknown_version() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");

        let task = Task::new(TaskType::Sbi, "Versioned", "").expect("new task");
        write_state(&path, &task, 0).expect("write");

        let doctored = fs::read_to_string(&path)
            .expect("read")
            .replace("\"version\": 1", "\"version\": 9");
        fs::write(&path, doctored).expect("rewrite");

        let err = load_state(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported state version"));
    }

    #[test]
    fn load_missing_state_reports_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent.json");
        let err = load_state(&path).unwrap_err();
        assert!(err.to_string().contains("read state"));
    }

    /// Drifted step values load as stored; resync happens on the next
    /// successful status update, not at the storage boundary.
    #[test]
    fn load_preserves_drifted_step() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");

        let task = Task::new(TaskType::Sbi, "Drifty", "").expect("new task");
        write_state(&path, &task, 1).expect("write");

        let doctored = fs::read_to_string(&path)
            .expect("read")
            .replace("\"step\": \"PICK\"", "\"step\": \"REVIEW\"");
        fs::write(&path, doctored).expect("rewrite");

        let (loaded, _) = load_state(&path).expect("load");
        assert_eq!(loaded.status(), Status::Pending);
        assert_eq!(loaded.step(), Step::Review);
    }
}
