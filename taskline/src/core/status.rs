//! Task lifecycle status machine.
//!
//! [`Status`] is a closed set; the transition table in
//! [`Status::can_transition`] is the single source of truth for which moves
//! are legal. [`Step`] is the coarser projection used to select the workflow
//! action for a turn and is always derived via [`Status::step`] — core logic
//! never stores a step that disagrees with the status it was derived from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::TaskError;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Not yet picked up; the workflow (re)starts here.
    Pending,
    /// Picked and queued for implementation.
    Picked,
    /// Implementation in progress.
    Implementing,
    /// Awaiting or undergoing review.
    Reviewing,
    /// Terminal success. No outgoing transitions.
    Done,
    /// Terminal-ish failure; recoverable only back to `Pending`.
    Failed,
}

impl Status {
    /// Every status, in declaration order. Used by exhaustive table tests.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Picked,
        Self::Implementing,
        Self::Reviewing,
        Self::Done,
        Self::Failed,
    ];

    /// Canonical storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Picked => "PICKED",
            Self::Implementing => "IMPLEMENTING",
            Self::Reviewing => "REVIEWING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    /// True iff `self -> to` appears in the transition table.
    ///
    /// Self-transitions are absent from the table and therefore illegal;
    /// `Done` is a terminal sink with no outgoing edges; `Failed` recovers
    /// only to `Pending` (a full restart, never a mid-pipeline jump).
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Picked)
                | (Self::Picked, Self::Implementing)
                | (Self::Picked, Self::Pending)
                | (Self::Implementing, Self::Reviewing)
                | (Self::Implementing, Self::Failed)
                | (Self::Implementing, Self::Pending)
                | (Self::Reviewing, Self::Done)
                | (Self::Reviewing, Self::Implementing)
                | (Self::Reviewing, Self::Failed)
                | (Self::Failed, Self::Pending)
        )
    }

    /// Project this status onto the workflow step that should run next.
    pub const fn step(self) -> Step {
        match self {
            Self::Pending | Self::Picked => Step::Pick,
            Self::Implementing => Step::Implement,
            Self::Reviewing => Step::Review,
            Self::Done | Self::Failed => Step::Done,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Status {
    type Error = TaskError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PICKED" => Ok(Self::Picked),
            "IMPLEMENTING" => Ok(Self::Implementing),
            "REVIEWING" => Ok(Self::Reviewing),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            _ => Err(TaskError::InvalidStatus(value.to_owned())),
        }
    }
}

/// Workflow action implied by the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    /// Select/queue the task for work.
    Pick,
    /// Run the implementation agent.
    Implement,
    /// Run the review agent.
    Review,
    /// Nothing left to run (terminal statuses).
    Done,
}

impl Step {
    /// Canonical storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pick => "PICK",
            Self::Implement => "IMPLEMENT",
            Self::Review => "REVIEW",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Step {
    type Error = TaskError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PICK" => Ok(Self::Pick),
            "IMPLEMENT" => Ok(Self::Implement),
            "REVIEW" => Ok(Self::Review),
            "DONE" => Ok(Self::Done),
            _ => Err(TaskError::InvalidStep(value.to_owned())),
        }
    }
}
