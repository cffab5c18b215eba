//! Domain error taxonomy for task lifecycle operations.

use thiserror::Error;

use crate::core::status::Status;

/// Errors returned by task construction, parsing, and mutation.
///
/// Validation and transition failures never leave the task partially
/// mutated: the caller observes either a clean error or a completed update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Task type string is not one of EPIC, PBI, SBI.
    #[error("invalid task type '{0}' (expected EPIC, PBI, or SBI)")]
    InvalidType(String),
    /// Title is empty or whitespace-only.
    #[error("task title must not be empty")]
    EmptyTitle,
    /// Status string is not one of the six lifecycle values.
    #[error("invalid status '{0}'")]
    InvalidStatus(String),
    /// Step string is not one of the four workflow steps.
    #[error("invalid step '{0}'")]
    InvalidStep(String),
    /// The transition table forbids this move.
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Status the task currently holds.
        from: Status,
        /// Status the caller attempted to set.
        to: Status,
    },
}
