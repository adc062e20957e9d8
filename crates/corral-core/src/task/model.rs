//! Task domain model.
//!
//! A `Task` is the unit of work exchanged between producers and workers via
//! the boards. The record is what gets serialized into the board files, so
//! every field here is part of the on-disk format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CorralError, Result};

/// Represents the current status of a task in its lifecycle.
///
/// Tasks progress through these states as they are claimed, executed, and
/// completed by workers. Status changes outside [`TaskStatus::can_transition_to`]
/// are rejected by the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// The task is in the backlog, waiting to be claimed.
    Pending,
    /// A worker has claimed the task but has not started it.
    Claimed,
    /// A worker is actively executing the task.
    Working,
    /// The task cannot proceed (unmet dependency, external blocker).
    Blocked,
    /// Work is finished and awaits review before final completion.
    CompletedPendingReview,
    /// The task completed successfully. Terminal.
    Completed,
    /// The task failed. Terminal until explicitly retried.
    Failed,
    /// A previously terminal task has been reopened.
    Reopened,
}

impl TaskStatus {
    /// Returns true for statuses that end the task's active lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Returns true if the state machine permits moving to `next`.
    ///
    /// A no-op transition (same status) is always permitted.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;

        if *self == next {
            return true;
        }

        matches!(
            (*self, next),
            (Pending, Claimed)
                | (Pending, Working)
                | (Claimed, Working)
                | (Claimed, Blocked)
                | (Working, CompletedPendingReview)
                | (Working, Completed)
                | (Working, Failed)
                | (Working, Blocked)
                | (CompletedPendingReview, Completed)
                | (CompletedPendingReview, Failed)
                | (Blocked, Pending)
                | (Failed, Pending)
                | (Completed, Reopened)
                | (Reopened, Pending)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Claimed => "CLAIMED",
            TaskStatus::Working => "WORKING",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::CompletedPendingReview => "COMPLETED_PENDING_REVIEW",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Reopened => "REOPENED",
        };
        f.write_str(s)
    }
}

/// Scheduling priority of a task. Stored for consumers; the substrate itself
/// does not reorder boards by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Critical,
    High,
    Normal,
    Low,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPriority::Critical => "CRITICAL",
            TaskPriority::High => "HIGH",
            TaskPriority::Normal => "NORMAL",
            TaskPriority::Low => "LOW",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = CorralError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(TaskPriority::Critical),
            "HIGH" => Ok(TaskPriority::High),
            "NORMAL" => Ok(TaskPriority::Normal),
            "LOW" => Ok(TaskPriority::Low),
            other => Err(CorralError::Config(format!(
                "unknown priority '{other}' (expected CRITICAL, HIGH, NORMAL, or LOW)"
            ))),
        }
    }
}

/// Outcome of a finished task, recorded on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskResult {
    /// The task succeeded.
    Success {
        message: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    /// The task failed.
    Error {
        error_code: String,
        message: String,
        #[serde(default)]
        details: serde_json::Value,
    },
}

impl TaskResult {
    /// Returns true for the success variant.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Success { .. })
    }
}

/// One entry in a task's append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNote {
    pub at: DateTime<Utc>,
    pub text: String,
}

/// A unit of work recorded on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Globally unique identifier, immutable once created.
    pub id: String,
    /// Human-readable description of the work.
    pub description: String,
    /// Opaque routing tag consumed by workers.
    pub task_type: String,
    #[serde(default)]
    pub priority: TaskPriority,
    pub status: TaskStatus,
    /// Worker currently responsible for the task, if any.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Task ids that must be COMPLETED before this task may be claimed.
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<TaskResult>,
    /// Append-only audit trail.
    #[serde(default)]
    pub notes: Vec<TaskNote>,
}

impl Task {
    /// Creates a new task in PENDING status.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique task id (callers typically use a UUID)
    /// * `description` - What the task is about
    /// * `task_type` - Opaque routing tag
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        task_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            description: description.into(),
            task_type: task_type.into(),
            priority: TaskPriority::default(),
            status: TaskStatus::Pending,
            assigned_to: None,
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
            claimed_at: None,
            completed_at: None,
            result: None,
            notes: Vec::new(),
        }
    }

    /// Sets the priority (builder style).
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the dependency list (builder style).
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Appends a timestamped note to the audit trail.
    pub fn push_note(&mut self, text: impl Into<String>) {
        self.notes.push(TaskNote {
            at: Utc::now(),
            text: text.into(),
        });
    }

    /// Validates the record against the board schema.
    ///
    /// Called by the board store before every write; a failing task aborts
    /// the whole write with prior content untouched.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CorralError::schema(&self.id, "id must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(CorralError::schema(
                &self.id,
                "description must not be empty",
            ));
        }
        if self.status.is_terminal() && self.completed_at.is_none() {
            return Err(CorralError::schema(
                &self.id,
                format!("status {} requires completed_at", self.status),
            ));
        }
        if matches!(self.status, TaskStatus::Claimed | TaskStatus::Working)
            && self.assigned_to.is_none()
        {
            return Err(CorralError::schema(
                &self.id,
                format!("status {} requires assigned_to", self.status),
            ));
        }
        Ok(())
    }
}

/// A partial update applied in place by the lifecycle engine.
///
/// Only set fields are touched. Status changes go through the transition
/// table; notes are appended, never replaced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub result: Option<TaskResult>,
    #[serde(default)]
    pub note: Option<String>,
}
