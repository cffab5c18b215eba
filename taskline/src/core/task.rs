//! Task aggregate root: the only mutator of status and step.
//!
//! Legality of status moves is delegated to the transition table in
//! [`Status::can_transition`]; every successful mutation bumps `updated_at`
//! and every failed one leaves the aggregate untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::core::error::TaskError;
use crate::core::status::{Status, Step};

/// Granularity of a unit of work.
///
/// EPIC and PBI tasks may be referenced as the parent of SBI tasks; the
/// relationship is a reference only, never ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Epic,
    Pbi,
    Sbi,
}

impl TaskType {
    /// Canonical storage representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epic => "EPIC",
            Self::Pbi => "PBI",
            Self::Sbi => "SBI",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskType {
    type Error = TaskError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EPIC" => Ok(Self::Epic),
            "PBI" => Ok(Self::Pbi),
            "SBI" => Ok(Self::Sbi),
            _ => Err(TaskError::InvalidType(value.to_owned())),
        }
    }
}

/// Opaque, time-sortable task identifier (ULID).
///
/// Equality is by value; the id never changes once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Mint a fresh identifier.
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted representation of a task aggregate.
///
/// This is the wire shape stored in `var/state.json`; reconstruction via
/// [`Task::from_persisted`] trusts the stored `step` as-is rather than
/// re-deriving it, so state drift (if any) is visible after a reload and
/// resynchronizes on the next successful status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTaskData {
    pub id: TaskId,
    pub kind: TaskType,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub step: Step,
    pub parent_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    kind: TaskType,
    title: String,
    description: String,
    status: Status,
    step: Step,
    parent_id: Option<TaskId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task: status starts at `PENDING`, step at `PICK`.
    ///
    /// Fails with [`TaskError::EmptyTitle`] when the title is blank.
    pub fn new(
        kind: TaskType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, TaskError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(TaskError::EmptyTitle);
        }
        let now = Utc::now();
        Ok(Self {
            id: TaskId::new(),
            kind,
            title,
            description: description.into(),
            status: Status::Pending,
            step: Step::Pick,
            parent_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Attach a parent reference (EPIC/PBI parent of an SBI).
    pub fn with_parent(mut self, parent: TaskId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Reconstruct a task from durable storage without re-deriving step.
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            kind: data.kind,
            title: data.title,
            description: data.description,
            status: data.status,
            step: data.step,
            parent_id: data.parent_id,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Clone the aggregate into its persisted wire shape.
    pub fn to_persisted(&self) -> PersistedTaskData {
        PersistedTaskData {
            id: self.id.clone(),
            kind: self.kind,
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            step: self.step,
            parent_id: self.parent_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn kind(&self) -> TaskType {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn parent_id(&self) -> Option<&TaskId> {
        self.parent_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move to a new status, recomputing step via the projection.
    ///
    /// Fails with [`TaskError::IllegalTransition`] when the table forbids
    /// the move; the task (including `updated_at`) is left unchanged.
    pub fn update_status(&mut self, to: Status) -> Result<(), TaskError> {
        if !self.status.can_transition(to) {
            return Err(TaskError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.step = to.step();
        self.touch();
        Ok(())
    }

    /// Escape hatch: re-enter a step without changing status.
    ///
    /// Step strings from external input are rejected at the
    /// `TryFrom<&str>` boundary with [`TaskError::InvalidStep`]; a parsed
    /// [`Step`] is always settable here.
    pub fn update_step(&mut self, step: Step) {
        self.step = step;
        self.touch();
    }

    /// Replace the title; blank input fails with [`TaskError::EmptyTitle`].
    pub fn update_title(&mut self, title: impl Into<String>) -> Result<(), TaskError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(TaskError::EmptyTitle);
        }
        self.title = title;
        self.touch();
        Ok(())
    }

    /// Replace the description; any value is accepted, including empty.
    pub fn update_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
