//! Task lifecycle engine.
//!
//! All board mutation funnels through this type. Every operation follows
//! the same discipline: acquire the lease locks of all touched boards in
//! the fixed global order, read, validate preconditions, mutate a copy in
//! memory, write the boards, and release the locks via guard drop. A
//! failure at any stage before the final writes leaves prior state
//! completely untouched.

use chrono::Utc;
use std::sync::Arc;

use crate::board::BoardKind;
use crate::error::{CorralError, Result};
use crate::ports::{BoardStore, LockGuard, LockManager};
use crate::task::{Task, TaskPatch, TaskResult, TaskStatus};

/// Coordinates task state across the three boards.
///
/// The engine holds no state of its own beyond its injected dependencies;
/// many engines in many processes may operate on the same data directory
/// concurrently.
pub struct LifecycleEngine {
    boards: Arc<dyn BoardStore>,
    locks: Arc<dyn LockManager>,
    /// Lease holder identity used for every lock this engine takes.
    holder: String,
}

impl LifecycleEngine {
    /// Creates an engine.
    ///
    /// # Arguments
    ///
    /// * `boards` - Board storage
    /// * `locks` - Lease lock manager
    /// * `holder` - Lock holder identity, unique per process (e.g.
    ///   `"worker-7"` or `"cli-1234"`)
    pub fn new(
        boards: Arc<dyn BoardStore>,
        locks: Arc<dyn LockManager>,
        holder: impl Into<String>,
    ) -> Self {
        Self {
            boards,
            locks,
            holder: holder.into(),
        }
    }

    /// Acquires the given board locks in the fixed global order.
    async fn lock_boards(&self, mut kinds: Vec<BoardKind>) -> Result<Vec<LockGuard>> {
        kinds.sort();
        kinds.dedup();
        let mut guards = Vec::with_capacity(kinds.len());
        for kind in kinds {
            guards.push(self.locks.acquire(kind.lock_resource(), &self.holder).await?);
        }
        Ok(guards)
    }

    /// Moves a task between two boards as an all-or-nothing operation.
    ///
    /// `apply` validates preconditions and mutates the in-memory copy; if
    /// it errors, nothing is written. The destination board is written
    /// before the source so that a crash between the two writes leaves a
    /// transient duplicate rather than a lost task; a failed source write
    /// rolls the destination back.
    async fn migrate<F>(
        &self,
        from: BoardKind,
        to: BoardKind,
        task_id: &str,
        apply: F,
    ) -> Result<Task>
    where
        F: FnOnce(&mut Task) -> Result<()>,
    {
        let _guards = self.lock_boards(vec![from, to]).await?;
        self.migrate_locked(from, to, task_id, apply).await
    }

    /// Migration body. Callers must already hold the lease locks of every
    /// board involved.
    async fn migrate_locked<F>(
        &self,
        from: BoardKind,
        to: BoardKind,
        task_id: &str,
        apply: F,
    ) -> Result<Task>
    where
        F: FnOnce(&mut Task) -> Result<()>,
    {
        let mut source = self.boards.read(from).await?;
        let pos = source
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| CorralError::TaskNotFound(task_id.to_string()))?;

        let mut task = source[pos].clone();
        apply(&mut task)?;
        task.updated_at = Utc::now();
        task.validate()?;
        source.remove(pos);

        let mut dest = self.boards.read(to).await?;
        dest.push(task.clone());

        self.boards.write(to, &dest).await?;
        if let Err(err) = self.boards.write(from, &source).await {
            dest.pop();
            if let Err(rollback_err) = self.boards.write(to, &dest).await {
                tracing::warn!(
                    "rollback of board '{}' failed after aborted migration of '{}': {}",
                    to,
                    task_id,
                    rollback_err
                );
            }
            return Err(err);
        }

        tracing::debug!("migrated task '{}' from {} to {}", task_id, from, to);
        Ok(task)
    }

    /// Locates the board currently holding a task. Lock-free snapshot scan
    /// in board order; board files are only replaced by atomic rename, so
    /// each read sees a consistent snapshot.
    async fn locate(&self, task_id: &str) -> Result<BoardKind> {
        for kind in BoardKind::ALL {
            if self
                .boards
                .read(kind)
                .await?
                .iter()
                .any(|t| t.id == task_id)
            {
                return Ok(kind);
            }
        }
        Err(CorralError::TaskNotFound(task_id.to_string()))
    }

    /// Creates a new task in the backlog.
    ///
    /// Rejects a duplicate id on any board, preserving the invariant that a
    /// task id lives on exactly one board.
    pub async fn create(&self, task: Task) -> Result<Task> {
        task.validate()?;
        if task.status != TaskStatus::Pending {
            return Err(CorralError::schema(
                &task.id,
                format!("new tasks must be PENDING, got {}", task.status),
            ));
        }

        let _guards = self.lock_boards(vec![BoardKind::Backlog]).await?;

        for kind in BoardKind::ALL {
            if self
                .boards
                .read(kind)
                .await?
                .iter()
                .any(|t| t.id == task.id)
            {
                return Err(CorralError::schema(
                    &task.id,
                    format!("a task with this id already exists on the {kind} board"),
                ));
            }
        }

        let mut backlog = self.boards.read(BoardKind::Backlog).await?;
        backlog.push(task.clone());
        self.boards.write(BoardKind::Backlog, &backlog).await?;

        tracing::info!("created task '{}' in backlog", task.id);
        Ok(task)
    }

    /// Claims a PENDING backlog task for a worker and migrates it to the
    /// working board.
    ///
    /// Fails with `TaskNotClaimable` when the status is not PENDING or a
    /// dependency has not COMPLETED, and with `TaskNotFound` when the task
    /// is not in the backlog. Under concurrent claims of the same task,
    /// exactly one caller wins; the others observe one of those errors.
    pub async fn claim(&self, task_id: &str, worker_id: &str) -> Result<Task> {
        // The dependency check reads the completed board, and reopen can
        // move a COMPLETED task back to the backlog, so the completed
        // board is locked along with the two migration boards.
        let _guards = self
            .lock_boards(vec![
                BoardKind::Backlog,
                BoardKind::Working,
                BoardKind::Completed,
            ])
            .await?;
        let completed = self.boards.read(BoardKind::Completed).await?;

        let worker = worker_id.to_string();
        let outcome = self
            .migrate_locked(BoardKind::Backlog, BoardKind::Working, task_id, |task| {
                if task.status != TaskStatus::Pending {
                    return Err(CorralError::not_claimable(
                        &task.id,
                        format!("status is {}, expected PENDING", task.status),
                    ));
                }
                for dep in &task.dependencies {
                    let done = completed
                        .iter()
                        .any(|t| t.id == *dep && t.status == TaskStatus::Completed);
                    if !done {
                        return Err(CorralError::not_claimable(
                            &task.id,
                            format!("dependency '{dep}' is not COMPLETED"),
                        ));
                    }
                }
                let now = Utc::now();
                task.status = TaskStatus::Working;
                task.assigned_to = Some(worker.clone());
                task.claimed_at = Some(now);
                task.push_note(format!("claimed by {worker}"));
                Ok(())
            })
            .await;

        match outcome {
            Ok(task) => {
                tracing::info!("task '{}' claimed by '{}'", task_id, worker_id);
                Ok(task)
            }
            // Not in the backlog: a task living on another board is not
            // claimable rather than unknown (a losing concurrent claimer
            // lands here).
            Err(CorralError::TaskNotFound(_)) => match self.get(task_id).await {
                Ok((board, existing)) => Err(CorralError::not_claimable(
                    task_id,
                    format!("status is {} on the {} board", existing.status, board),
                )),
                Err(_) => Err(CorralError::TaskNotFound(task_id.to_string())),
            },
            Err(err) => Err(err),
        }
    }

    /// Applies a patch in place on whichever board currently holds the
    /// task. Status changes go through the transition table.
    pub async fn update(&self, task_id: &str, patch: TaskPatch) -> Result<Task> {
        // The lock-free locate can race a concurrent migration; one retry
        // after re-scanning covers the window.
        for _attempt in 0..2 {
            let board = self.locate(task_id).await?;
            let _guards = self.lock_boards(vec![board]).await?;

            let mut tasks = self.boards.read(board).await?;
            let Some(pos) = tasks.iter().position(|t| t.id == task_id) else {
                continue;
            };

            let task = &mut tasks[pos];
            apply_patch(task, &patch)?;
            task.updated_at = Utc::now();

            let updated = task.clone();
            self.boards.write(board, &tasks).await?;
            tracing::debug!("updated task '{}' on {} board", task_id, board);
            return Ok(updated);
        }
        Err(CorralError::TaskNotFound(task_id.to_string()))
    }

    /// Finishes a task and migrates it from working to completed.
    ///
    /// Requires current status WORKING or COMPLETED_PENDING_REVIEW. A
    /// success result lands as COMPLETED, an error result as FAILED.
    pub async fn complete(&self, task_id: &str, result: TaskResult) -> Result<Task> {
        let terminal = if result.is_success() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };

        let task = self
            .migrate(BoardKind::Working, BoardKind::Completed, task_id, |task| {
                if !matches!(
                    task.status,
                    TaskStatus::Working | TaskStatus::CompletedPendingReview
                ) {
                    return Err(CorralError::invalid_transition(
                        &task.id,
                        task.status,
                        terminal,
                    ));
                }
                task.status = terminal;
                task.completed_at = Some(Utc::now());
                task.result = Some(result);
                Ok(())
            })
            .await?;

        tracing::info!("task '{}' finished as {}", task_id, terminal);
        Ok(task)
    }

    /// Returns an abandoned WORKING task to the backlog.
    ///
    /// Used by the stale reclaimer; also available to supervisors. Resets
    /// the status to PENDING, clears the assignment, and records `reason`
    /// in the audit trail.
    pub async fn requeue(&self, task_id: &str, reason: &str) -> Result<Task> {
        let reason = reason.to_string();
        let task = self
            .migrate(BoardKind::Working, BoardKind::Backlog, task_id, |task| {
                if task.status != TaskStatus::Working {
                    return Err(CorralError::invalid_transition(
                        &task.id,
                        task.status,
                        TaskStatus::Pending,
                    ));
                }
                task.status = TaskStatus::Pending;
                task.assigned_to = None;
                task.claimed_at = None;
                task.push_note(reason);
                Ok(())
            })
            .await?;

        tracing::info!("task '{}' requeued to backlog", task_id);
        Ok(task)
    }

    /// Returns a terminal task (COMPLETED or FAILED) from the completed
    /// board to the backlog for another run.
    pub async fn reopen(&self, task_id: &str) -> Result<Task> {
        let task = self
            .migrate(BoardKind::Completed, BoardKind::Backlog, task_id, |task| {
                if !task.status.is_terminal() {
                    return Err(CorralError::invalid_transition(
                        &task.id,
                        task.status,
                        TaskStatus::Pending,
                    ));
                }
                let previous = task.status;
                task.status = TaskStatus::Pending;
                task.assigned_to = None;
                task.claimed_at = None;
                task.completed_at = None;
                task.push_note(format!("reopened from {previous}"));
                Ok(())
            })
            .await?;

        tracing::info!("task '{}' reopened", task_id);
        Ok(task)
    }

    /// Looks a task up across all boards. Lock-free snapshot read.
    pub async fn get(&self, task_id: &str) -> Result<(BoardKind, Task)> {
        for kind in BoardKind::ALL {
            if let Some(task) = self
                .boards
                .read(kind)
                .await?
                .into_iter()
                .find(|t| t.id == task_id)
            {
                return Ok((kind, task));
            }
        }
        Err(CorralError::TaskNotFound(task_id.to_string()))
    }

    /// Lists a board's contents. Lock-free snapshot read.
    pub async fn list(&self, board: BoardKind) -> Result<Vec<Task>> {
        self.boards.read(board).await
    }
}

/// Applies the set fields of a patch to a task. Notes are appended, never
/// replaced; the status change must be legal.
fn apply_patch(task: &mut Task, patch: &TaskPatch) -> Result<()> {
    if let Some(next) = patch.status {
        if !task.status.can_transition_to(next) {
            return Err(CorralError::invalid_transition(&task.id, task.status, next));
        }
        task.status = next;
    }
    if let Some(description) = &patch.description {
        task.description = description.clone();
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(result) = &patch.result {
        task.result = Some(result.clone());
    }
    if let Some(note) = &patch.note {
        task.push_note(note.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryBoardStore, MemoryLockManager};

    fn engine() -> (LifecycleEngine, Arc<MemoryBoardStore>) {
        let boards = Arc::new(MemoryBoardStore::new());
        let locks = Arc::new(MemoryLockManager::new());
        let engine = LifecycleEngine::new(boards.clone(), locks, "test-engine");
        (engine, boards)
    }

    fn task(id: &str) -> Task {
        Task::new(id, format!("task {id}"), "test")
    }

    #[tokio::test]
    async fn test_create_lands_in_backlog() {
        let (engine, _) = engine();
        engine.create(task("t-1")).await.unwrap();

        let backlog = engine.list(BoardKind::Backlog).await.unwrap();
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id_on_any_board() {
        let (engine, _) = engine();
        engine.create(task("t-1")).await.unwrap();
        engine.claim("t-1", "w-1").await.unwrap();

        // t-1 now lives on the working board; creating it again must fail.
        let err = engine.create(task("t-1")).await.unwrap_err();
        assert_eq!(err.category(), "SCHEMA_ERROR");
    }

    #[tokio::test]
    async fn test_claim_moves_task_and_assigns_worker() {
        let (engine, _) = engine();
        engine.create(task("t-1")).await.unwrap();

        let claimed = engine.claim("t-1", "w-1").await.unwrap();
        assert_eq!(claimed.status, TaskStatus::Working);
        assert_eq!(claimed.assigned_to.as_deref(), Some("w-1"));
        assert!(claimed.claimed_at.is_some());

        assert!(engine.list(BoardKind::Backlog).await.unwrap().is_empty());
        let working = engine.list(BoardKind::Working).await.unwrap();
        assert_eq!(working.len(), 1);
        assert_eq!(working[0].id, "t-1");
    }

    #[tokio::test]
    async fn test_claim_missing_task() {
        let (engine, _) = engine();
        let err = engine.claim("nope", "w-1").await.unwrap_err();
        assert_eq!(err.category(), "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_claim_rejects_unmet_dependency() {
        let (engine, _) = engine();
        engine.create(task("dep")).await.unwrap();
        engine
            .create(task("t-1").with_dependencies(vec!["dep".to_string()]))
            .await
            .unwrap();

        let err = engine.claim("t-1", "w-1").await.unwrap_err();
        assert_eq!(err.category(), "TASK_NOT_CLAIMABLE");

        // Complete the dependency, then the claim goes through.
        engine.claim("dep", "w-2").await.unwrap();
        engine
            .complete(
                "dep",
                TaskResult::Success {
                    message: "done".to_string(),
                    data: serde_json::Value::Null,
                },
            )
            .await
            .unwrap();
        engine.claim("t-1", "w-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_dependency_does_not_satisfy_claim() {
        let (engine, _) = engine();
        engine.create(task("dep")).await.unwrap();
        engine
            .create(task("t-1").with_dependencies(vec!["dep".to_string()]))
            .await
            .unwrap();

        engine.claim("dep", "w-2").await.unwrap();
        engine
            .complete(
                "dep",
                TaskResult::Error {
                    error_code: "E_BOOM".to_string(),
                    message: "exploded".to_string(),
                    details: serde_json::Value::Null,
                },
            )
            .await
            .unwrap();

        // dep is on the completed board but FAILED, which does not count.
        let err = engine.claim("t-1", "w-1").await.unwrap_err();
        assert_eq!(err.category(), "TASK_NOT_CLAIMABLE");
    }

    #[tokio::test]
    async fn test_claim_rejects_reopened_dependency() {
        let (engine, _) = engine();
        engine.create(task("dep")).await.unwrap();
        engine
            .create(task("t-1").with_dependencies(vec!["dep".to_string()]))
            .await
            .unwrap();

        engine.claim("dep", "w-2").await.unwrap();
        engine
            .complete(
                "dep",
                TaskResult::Success {
                    message: "done".to_string(),
                    data: serde_json::Value::Null,
                },
            )
            .await
            .unwrap();
        engine.reopen("dep").await.unwrap();

        // The dependency is back on the backlog as PENDING; it no longer
        // satisfies the claim.
        let err = engine.claim("t-1", "w-1").await.unwrap_err();
        assert_eq!(err.category(), "TASK_NOT_CLAIMABLE");
    }

    #[tokio::test]
    async fn test_complete_success_and_failure() {
        let (engine, _) = engine();
        engine.create(task("t-1")).await.unwrap();
        engine.create(task("t-2")).await.unwrap();
        engine.claim("t-1", "w-1").await.unwrap();
        engine.claim("t-2", "w-1").await.unwrap();

        let done = engine
            .complete(
                "t-1",
                TaskResult::Success {
                    message: "ok".to_string(),
                    data: serde_json::json!({ "lines": 42 }),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());

        let failed = engine
            .complete(
                "t-2",
                TaskResult::Error {
                    error_code: "E_IO".to_string(),
                    message: "disk full".to_string(),
                    details: serde_json::Value::Null,
                },
            )
            .await
            .unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);

        let completed = engine.list(BoardKind::Completed).await.unwrap();
        assert_eq!(completed.len(), 2);
        assert!(engine.list(BoardKind::Working).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_requires_working_status() {
        let (engine, _) = engine();
        engine.create(task("t-1")).await.unwrap();

        // Still PENDING in the backlog: not on the working board at all.
        let err = engine
            .complete(
                "t-1",
                TaskResult::Success {
                    message: "ok".to_string(),
                    data: serde_json::Value::Null,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_applies_patch_in_place() {
        let (engine, _) = engine();
        engine.create(task("t-1")).await.unwrap();
        engine.claim("t-1", "w-1").await.unwrap();

        let updated = engine
            .update(
                "t-1",
                TaskPatch {
                    status: Some(TaskStatus::Blocked),
                    note: Some("waiting on credentials".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Blocked);
        assert!(updated.notes.iter().any(|n| n.text.contains("credentials")));

        // The task stayed on the working board.
        let working = engine.list(BoardKind::Working).await.unwrap();
        assert_eq!(working.len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_illegal_transition() {
        let (engine, _) = engine();
        engine.create(task("t-1")).await.unwrap();

        let err = engine
            .update(
                "t-1",
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_requeue_resets_assignment() {
        let (engine, _) = engine();
        engine.create(task("t-1")).await.unwrap();
        engine.claim("t-1", "w-1").await.unwrap();

        let requeued = engine
            .requeue("t-1", "stale: worker w-1 liveness expired")
            .await
            .unwrap();
        assert_eq!(requeued.status, TaskStatus::Pending);
        assert!(requeued.assigned_to.is_none());
        assert!(requeued.claimed_at.is_none());
        assert!(requeued.notes.iter().any(|n| n.text.contains("stale")));

        // And it can be claimed again by someone else.
        let reclaimed = engine.claim("t-1", "w-2").await.unwrap();
        assert_eq!(reclaimed.assigned_to.as_deref(), Some("w-2"));
    }

    #[tokio::test]
    async fn test_reopen_returns_terminal_task_to_backlog() {
        let (engine, _) = engine();
        engine.create(task("t-1")).await.unwrap();
        engine.claim("t-1", "w-1").await.unwrap();
        engine
            .complete(
                "t-1",
                TaskResult::Success {
                    message: "ok".to_string(),
                    data: serde_json::Value::Null,
                },
            )
            .await
            .unwrap();

        let reopened = engine.reopen("t-1").await.unwrap();
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert!(reopened.completed_at.is_none());

        let backlog = engine.list(BoardKind::Backlog).await.unwrap();
        assert_eq!(backlog.len(), 1);
    }

    #[tokio::test]
    async fn test_task_id_never_on_two_boards() {
        let (engine, boards) = engine();
        engine.create(task("t-1")).await.unwrap();
        engine.claim("t-1", "w-1").await.unwrap();
        engine
            .complete(
                "t-1",
                TaskResult::Success {
                    message: "ok".to_string(),
                    data: serde_json::Value::Null,
                },
            )
            .await
            .unwrap();
        engine.reopen("t-1").await.unwrap();

        let mut occurrences = 0;
        for kind in BoardKind::ALL {
            occurrences += boards
                .read(kind)
                .await
                .unwrap()
                .iter()
                .filter(|t| t.id == "t-1")
                .count();
        }
        assert_eq!(occurrences, 1);
    }

    #[tokio::test]
    async fn test_concurrent_claims_one_winner() {
        let boards = Arc::new(MemoryBoardStore::new());
        let locks = Arc::new(MemoryLockManager::new());
        let engine = Arc::new(LifecycleEngine::new(
            boards.clone(),
            locks,
            "test-engine",
        ));
        engine.create(task("t-1")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.claim("t-1", &format!("w-{i}")).await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(err) => assert_eq!(err.category(), "TASK_NOT_CLAIMABLE"),
            }
        }
        assert_eq!(wins, 1);
    }
}
