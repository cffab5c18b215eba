//! Journal record normalization and validation.
//!
//! Normalization is pure: the caller supplies the timestamp, so the io
//! layer remains the only clock consumer and these functions stay
//! deterministic for tests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reviewer decision recorded with a transition.
///
/// Producers inside this crate always emit one of these three values; the
/// journal writer itself carries the decision as a plain string so that
/// out-of-set input survives soft validation verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Work ongoing; no review verdict yet.
    Pending,
    /// Review rejected the work; implementation re-enters.
    NeedsChanges,
    /// Review accepted the work.
    Ok,
}

impl Decision {
    /// Canonical wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::NeedsChanges => "NEEDS_CHANGES",
            Self::Ok => "OK",
        }
    }

    /// Parse a wire string; `None` for anything outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "NEEDS_CHANGES" => Some(Self::NeedsChanges),
            "OK" => Some(Self::Ok),
            _ => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized transition record (one NDJSON line).
///
/// Once appended, a record is never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// RFC3339 timestamp with nanoseconds.
    pub ts: String,
    /// Driver turn counter, zero-based at registration.
    pub turn: u64,
    /// Workflow step the record describes.
    pub step: String,
    /// Decision string; producers use [`Decision`].
    pub decision: String,
    /// Wall-clock duration of the turn.
    pub elapsed_ms: i64,
    /// Error text, empty when the turn succeeded.
    pub error: String,
    /// Paths or names of artifacts produced by the turn. Never null.
    pub artifacts: Vec<String>,
}

/// Build a complete entry from a possibly partial JSON object.
///
/// Missing or wrong-typed fields fall back to defaults: `ts` to the
/// caller-supplied `now`, `decision` to `PENDING`, `artifacts` to an empty
/// list. Numeric fields arriving as floating point are coerced to integers.
pub fn normalize_entry(raw: &Value, now: &str) -> JournalEntry {
    let field = |key: &str| raw.as_object().and_then(|map| map.get(key));

    let ts = field("ts")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(|| now.to_string(), str::to_string);
    let turn = field("turn").map_or(0, coerce_u64);
    let step = field("step")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let decision = field("decision")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(Decision::Pending.as_str())
        .to_string();
    let elapsed_ms = field("elapsed_ms").map_or(0, coerce_i64);
    let error = field("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let artifacts = field("artifacts")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    JournalEntry {
        ts,
        turn,
        step,
        decision,
        elapsed_ms,
        error,
        artifacts,
    }
}

/// Check schema constraints on a normalized entry.
///
/// Returns a list of stable messages (empty on success). Soft-validation
/// callers log these as warnings without blocking the append.
pub fn validate_entry(entry: &JournalEntry) -> Vec<String> {
    let mut errors = Vec::new();
    if entry.ts.is_empty() {
        errors.push("ts must not be empty".to_string());
    }
    if entry.step.is_empty() {
        errors.push("step must not be empty".to_string());
    }
    if Decision::parse(&entry.decision).is_none() {
        errors.push(format!(
            "decision '{}' is not one of PENDING, NEEDS_CHANGES, OK",
            entry.decision
        ));
    }
    errors
}

fn coerce_u64(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|f| f.max(0.0) as u64))
        .unwrap_or(0)
}

fn coerce_i64(value: &Value) -> i64 {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const NOW: &str = "2026-01-02T03:04:05.000000006Z";

    #[test]
    fn normalize_fills_defaults_for_empty_object() {
        let entry = normalize_entry(&json!({}), NOW);
        assert_eq!(entry.ts, NOW);
        assert_eq!(entry.turn, 0);
        assert_eq!(entry.step, "");
        assert_eq!(entry.decision, "PENDING");
        assert_eq!(entry.elapsed_ms, 0);
        assert_eq!(entry.error, "");
        assert!(entry.artifacts.is_empty(), "artifacts must never be null");
    }

    #[test]
    fn normalize_keeps_complete_input_verbatim() {
        let raw = json!({
            "ts": "2026-01-01T00:00:00.000000001Z",
            "turn": 7,
            "step": "REVIEW",
            "decision": "NEEDS_CHANGES",
            "elapsed_ms": 1234,
            "error": "guard failed",
            "artifacts": ["var/turns/7/agent.log"],
        });
        let entry = normalize_entry(&raw, NOW);
        assert_eq!(entry.ts, "2026-01-01T00:00:00.000000001Z");
        assert_eq!(entry.turn, 7);
        assert_eq!(entry.decision, "NEEDS_CHANGES");
        assert_eq!(entry.artifacts, vec!["var/turns/7/agent.log".to_string()]);
    }

    #[test]
    fn normalize_coerces_float_numerics() {
        let entry = normalize_entry(&json!({"turn": 3.0, "elapsed_ms": 250.9}), NOW);
        assert_eq!(entry.turn, 3);
        assert_eq!(entry.elapsed_ms, 250);
    }

    #[test]
    fn normalize_drops_non_string_artifacts() {
        let entry = normalize_entry(&json!({"artifacts": ["a.log", 42, null, "b.json"]}), NOW);
        assert_eq!(entry.artifacts, vec!["a.log".to_string(), "b.json".to_string()]);
    }

    /// Out-of-set decisions are reported but not rewritten; the writer
    /// appends the payload verbatim under soft validation.
    #[test]
    fn validate_reports_out_of_set_decision() {
        let mut entry = normalize_entry(&json!({"step": "REVIEW"}), NOW);
        entry.decision = "MAYBE".to_string();
        let errors = validate_entry(&entry);
        assert_eq!(
            errors,
            vec!["decision 'MAYBE' is not one of PENDING, NEEDS_CHANGES, OK".to_string()]
        );
        assert_eq!(entry.decision, "MAYBE");
    }

    #[test]
    fn validate_accepts_normalized_entry() {
        let entry = normalize_entry(&json!({"step": "PICK", "decision": "OK"}), NOW);
        assert!(validate_entry(&entry).is_empty());
    }

    #[test]
    fn validate_flags_empty_step() {
        let entry = normalize_entry(&json!({}), NOW);
        assert_eq!(validate_entry(&entry), vec!["step must not be empty".to_string()]);
    }

    #[test]
    fn decision_round_trips_through_wire_strings() {
        for decision in [Decision::Pending, Decision::NeedsChanges, Decision::Ok] {
            assert_eq!(Decision::parse(decision.as_str()), Some(decision));
        }
        assert_eq!(Decision::parse("MAYBE"), None);
    }
}
