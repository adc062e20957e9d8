//! Board identifiers.
//!
//! Each lifecycle stage is one durable board file. The enum's declaration
//! order doubles as the global lock-acquisition order (backlog before
//! working before completed), which prevents deadlock between concurrent
//! cross-board migrations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CorralError;

/// One lifecycle stage backed by a single board file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    /// Tasks waiting to be claimed.
    Backlog,
    /// Tasks currently assigned to a worker.
    Working,
    /// Terminal tasks (completed or failed).
    Completed,
}

impl BoardKind {
    /// All boards, in lock-acquisition order.
    pub const ALL: [BoardKind; 3] = [BoardKind::Backlog, BoardKind::Working, BoardKind::Completed];

    /// File name of the board inside the boards directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            BoardKind::Backlog => "backlog.json",
            BoardKind::Working => "working.json",
            BoardKind::Completed => "completed.json",
        }
    }

    /// Lease lock resource name guarding this board.
    pub fn lock_resource(&self) -> &'static str {
        match self {
            BoardKind::Backlog => "board-backlog",
            BoardKind::Working => "board-working",
            BoardKind::Completed => "board-completed",
        }
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BoardKind::Backlog => "backlog",
            BoardKind::Working => "working",
            BoardKind::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for BoardKind {
    type Err = CorralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(BoardKind::Backlog),
            "working" => Ok(BoardKind::Working),
            "completed" => Ok(BoardKind::Completed),
            other => Err(CorralError::Config(format!(
                "unknown board '{other}' (expected backlog, working, or completed)"
            ))),
        }
    }
}
