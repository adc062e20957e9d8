//! Error types for the corral coordination substrate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A convenient result type used throughout the substrate.
pub type Result<T> = std::result::Result<T, CorralError>;

/// A shared error type for the entire corral substrate.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. Every variant maps to a
/// stable category string (see [`CorralError::category`]) that the CLI
/// prints before exiting non-zero.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CorralError {
    /// Lock not acquired within the configured budget.
    ///
    /// Callers should retry with backoff or abandon the operation; no
    /// partial state is left behind.
    #[error("lock on '{resource}' not acquired within {waited_ms}ms")]
    LockTimeout { resource: String, waited_ms: u64 },

    /// Persisted board content is malformed.
    ///
    /// Never auto-repaired destructively; surfaced for manual or automated
    /// recovery from last-known-good content.
    #[error("board '{board}' is corrupt: {message}")]
    BoardCorruption { board: String, message: String },

    /// An attempted write violates the task schema. The write is aborted
    /// with prior content untouched.
    #[error("task '{task_id}' violates schema: {message}")]
    Schema { task_id: String, message: String },

    /// The task id is not present on the expected board.
    #[error("task not found: '{0}'")]
    TaskNotFound(String),

    /// The task's status or dependencies do not permit claiming.
    #[error("task '{task_id}' is not claimable: {reason}")]
    TaskNotClaimable { task_id: String, reason: String },

    /// A status change not permitted by the task state machine.
    #[error("invalid transition for task '{task_id}': {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    /// A mailbox message could not be delivered or consumed.
    #[error("mailbox delivery to '{recipient}' failed: {message}")]
    MailboxDelivery { recipient: String, message: String },

    /// IO error (file system operations).
    #[error("io error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {format} - {message}")]
    Serialization {
        format: String, // "JSON", "TOML", etc.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation).
    #[error("internal error: {0}")]
    Internal(String),
}

impl CorralError {
    /// Creates a LockTimeout error.
    pub fn lock_timeout(resource: impl Into<String>, waited_ms: u64) -> Self {
        Self::LockTimeout {
            resource: resource.into(),
            waited_ms,
        }
    }

    /// Creates a BoardCorruption error.
    pub fn corruption(board: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BoardCorruption {
            board: board.into(),
            message: message.into(),
        }
    }

    /// Creates a Schema error.
    pub fn schema(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    /// Creates a TaskNotClaimable error.
    pub fn not_claimable(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TaskNotClaimable {
            task_id: task_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an InvalidTransition error.
    pub fn invalid_transition(
        task_id: impl Into<String>,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            task_id: task_id.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Creates a MailboxDelivery error.
    pub fn mailbox(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MailboxDelivery {
            recipient: recipient.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Stable category identifier, printed by the CLI on failure.
    pub fn category(&self) -> &'static str {
        match self {
            Self::LockTimeout { .. } => "LOCK_TIMEOUT",
            Self::BoardCorruption { .. } => "BOARD_CORRUPTION",
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::TaskNotClaimable { .. } => "TASK_NOT_CLAIMABLE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::MailboxDelivery { .. } => "MAILBOX_DELIVERY",
            Self::Io { .. } => "IO_ERROR",
            Self::Serialization { .. } => "SERIALIZATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for CorralError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for CorralError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_is_stable() {
        let err = CorralError::lock_timeout("backlog", 500);
        assert_eq!(err.category(), "LOCK_TIMEOUT");

        let err = CorralError::TaskNotFound("t-1".to_string());
        assert_eq!(err.category(), "TASK_NOT_FOUND");
    }

    #[test]
    fn test_errors_are_serializable() {
        let err = CorralError::not_claimable("t-1", "status is WORKING");
        let json = serde_json::to_string(&err).unwrap();
        let back: CorralError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.category(), "TASK_NOT_CLAIMABLE");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CorralError = io.into();
        assert_eq!(err.category(), "IO_ERROR");
    }
}
