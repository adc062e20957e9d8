//! Mailbox message envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point-to-point message materialized as one file in the recipient's
/// inbox. Messages are ephemeral: consumption moves the file to the
/// recipient's archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id; also the file name stem inside the inbox.
    pub id: String,
    pub sender: String,
    pub recipient: String,
    /// Free-form message type, e.g. "task_ready" or "shutdown".
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a new message with a generated id.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipient: recipient.into(),
            kind: kind.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}
