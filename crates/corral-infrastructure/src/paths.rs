//! Unified path management for the corral data directory.
//!
//! Everything the substrate persists lives under one root, so a single
//! shared mount is all that worker hosts need.

use std::path::{Path, PathBuf};

use corral_core::board::BoardKind;
use corral_core::error::Result;

/// Layout of the shared data directory.
///
/// # Directory Structure
///
/// ```text
/// <data_dir>/
/// ├── boards/
/// │   ├── backlog.json
/// │   ├── working.json
/// │   └── completed.json
/// ├── locks/
/// │   └── <resource>.lock
/// ├── liveness.json
/// └── mailboxes/
///     └── <worker-id>/
///         ├── inbox/<message-id>.json
///         └── archive/<message-id>.json
/// ```
#[derive(Debug, Clone)]
pub struct CorralPaths {
    root: PathBuf,
}

impl CorralPaths {
    /// Creates a path layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn boards_dir(&self) -> PathBuf {
        self.root.join("boards")
    }

    pub fn board_file(&self, board: BoardKind) -> PathBuf {
        self.boards_dir().join(board.file_name())
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn lock_file(&self, resource: &str) -> PathBuf {
        self.locks_dir().join(format!("{resource}.lock"))
    }

    pub fn liveness_file(&self) -> PathBuf {
        self.root.join("liveness.json")
    }

    pub fn mailboxes_dir(&self) -> PathBuf {
        self.root.join("mailboxes")
    }

    pub fn inbox_dir(&self, worker_id: &str) -> PathBuf {
        self.mailboxes_dir().join(worker_id).join("inbox")
    }

    pub fn archive_dir(&self, worker_id: &str) -> PathBuf {
        self.mailboxes_dir().join(worker_id).join("archive")
    }

    /// Creates the fixed parts of the layout. Mailbox directories are
    /// created lazily on first delivery.
    pub fn ensure_layout(&self) -> Result<()> {
        std::fs::create_dir_all(self.boards_dir())?;
        std::fs::create_dir_all(self.locks_dir())?;
        std::fs::create_dir_all(self.mailboxes_dir())?;
        Ok(())
    }
}
