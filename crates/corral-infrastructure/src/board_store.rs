//! File-backed board store.
//!
//! One JSON file per lifecycle stage. Writes validate every task first and
//! then replace the file atomically; malformed content surfaces as
//! `BoardCorruption` and is never repaired by overwriting.

use async_trait::async_trait;

use corral_core::board::BoardKind;
use corral_core::error::{CorralError, Result};
use corral_core::ports::BoardStore;
use corral_core::task::Task;

use crate::atomic_json::AtomicJsonFile;
use crate::paths::CorralPaths;

/// Board storage over the shared data directory.
pub struct FileBoardStore {
    paths: CorralPaths,
}

impl FileBoardStore {
    pub fn new(paths: CorralPaths) -> Self {
        Self { paths }
    }

    fn file(&self, board: BoardKind) -> AtomicJsonFile<Vec<Task>> {
        AtomicJsonFile::new(self.paths.board_file(board))
    }
}

#[async_trait]
impl BoardStore for FileBoardStore {
    async fn read(&self, board: BoardKind) -> Result<Vec<Task>> {
        match self.file(board).load() {
            Ok(Some(tasks)) => Ok(tasks),
            Ok(None) => Ok(Vec::new()),
            Err(CorralError::Serialization { message, .. }) => {
                Err(CorralError::corruption(board.to_string(), message))
            }
            Err(err) => Err(err),
        }
    }

    async fn write(&self, board: BoardKind, tasks: &[Task]) -> Result<()> {
        for task in tasks {
            task.validate()?;
        }
        self.file(board).save(&tasks.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use corral_core::task::TaskStatus;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileBoardStore {
        let paths = CorralPaths::new(dir.path());
        paths.ensure_layout().unwrap();
        FileBoardStore::new(paths)
    }

    #[tokio::test]
    async fn test_read_missing_board_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.read(BoardKind::Backlog).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let tasks = vec![
            Task::new("t-1", "first", "test"),
            Task::new("t-2", "second", "test"),
        ];
        store.write(BoardKind::Backlog, &tasks).await.unwrap();

        let read = store.read(BoardKind::Backlog).await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].id, "t-1");
        assert_eq!(read[1].id, "t-2");
    }

    #[tokio::test]
    async fn test_corrupt_board_surfaces_without_truncation() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let path = dir.path().join("boards/working.json");
        std::fs::write(&path, "[{\"id\": ").unwrap();

        let err = store.read(BoardKind::Working).await.unwrap_err();
        assert_eq!(err.category(), "BOARD_CORRUPTION");

        // The bytes are untouched for manual recovery.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{\"id\": ");
    }

    #[tokio::test]
    async fn test_schema_failure_leaves_board_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let good = vec![Task::new("t-1", "fine", "test")];
        store.write(BoardKind::Backlog, &good).await.unwrap();
        let before = std::fs::read(dir.path().join("boards/backlog.json")).unwrap();

        // WORKING without an assignee violates the schema.
        let mut bad = Task::new("t-2", "broken", "test");
        bad.status = TaskStatus::Working;
        let err = store
            .write(BoardKind::Backlog, &[good[0].clone(), bad])
            .await
            .unwrap_err();
        assert_eq!(err.category(), "SCHEMA_ERROR");

        let after = std::fs::read(dir.path().join("boards/backlog.json")).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_terminal_task_persists_result() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut task = Task::new("t-1", "done work", "test");
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.result = Some(corral_core::task::TaskResult::Success {
            message: "all good".to_string(),
            data: serde_json::json!({ "artifacts": ["a.txt"] }),
        });
        store.write(BoardKind::Completed, &[task]).await.unwrap();

        let read = store.read(BoardKind::Completed).await.unwrap();
        assert_eq!(read[0].status, TaskStatus::Completed);
        assert!(read[0].result.as_ref().unwrap().is_success());
    }
}
