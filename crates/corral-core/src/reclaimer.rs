//! Stale task reclaimer.
//!
//! Workers report liveness on a fixed cadence; the reclaimer periodically
//! compares the working board against the heartbeat registry and returns
//! abandoned tasks to the backlog. It runs as an independent process or a
//! background loop alongside a worker.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::board::BoardKind;
use crate::config::CorralConfig;
use crate::engine::LifecycleEngine;
use crate::error::{CorralError, Result};
use crate::ports::LivenessRegistry;
use crate::task::TaskStatus;

/// Outcome of one reclamation sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// WORKING tasks inspected.
    pub examined: usize,
    /// Task ids returned to the backlog.
    pub requeued: Vec<String>,
    /// Stale task ids that could not be requeued this sweep (lock
    /// contention or a concurrent migration); picked up next time.
    pub skipped: Vec<String>,
}

/// Detects tasks whose assigned worker has stopped heartbeating and
/// requeues them through the lifecycle engine.
pub struct StaleReclaimer {
    engine: Arc<LifecycleEngine>,
    liveness: Arc<dyn LivenessRegistry>,
    ttl: ChronoDuration,
}

impl StaleReclaimer {
    /// Creates a reclaimer using the configured heartbeat TTL.
    pub fn new(
        engine: Arc<LifecycleEngine>,
        liveness: Arc<dyn LivenessRegistry>,
        config: &CorralConfig,
    ) -> Self {
        Self {
            engine,
            liveness,
            ttl: ChronoDuration::seconds(config.heartbeat_ttl_secs as i64),
        }
    }

    /// Runs one sweep over the working board.
    ///
    /// A task counts as stale when its worker is absent from the registry
    /// or the last heartbeat is older than the TTL. An empty or missing
    /// registry makes every assignment stale. Lock contention on an
    /// individual requeue is skipped, never waited out.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let working = self.engine.list(BoardKind::Working).await?;
        let heartbeats = self.liveness.snapshot().await?;
        let now = Utc::now();

        let mut report = SweepReport::default();
        for task in working {
            if task.status != TaskStatus::Working {
                continue;
            }
            report.examined += 1;

            let stale = match task.assigned_to.as_deref() {
                Some(worker) => match heartbeats.get(worker) {
                    Some(last) => now - *last > self.ttl,
                    None => true,
                },
                // A WORKING task without an assignee should not exist, but
                // if it does, nobody will ever finish it.
                None => true,
            };
            if !stale {
                continue;
            }

            let worker = task.assigned_to.clone().unwrap_or_default();
            let reason = format!("stale: worker {worker} liveness expired");
            match self.engine.requeue(&task.id, &reason).await {
                Ok(_) => {
                    tracing::info!("requeued stale task '{}' (worker '{}')", task.id, worker);
                    report.requeued.push(task.id);
                }
                Err(CorralError::LockTimeout { .. }) => {
                    tracing::debug!(
                        "skipping stale task '{}': boards are locked, retrying next sweep",
                        task.id
                    );
                    report.skipped.push(task.id);
                }
                // The task finished or moved between our snapshot and the
                // locked re-check; nothing to reclaim.
                Err(CorralError::TaskNotFound(_)) | Err(CorralError::InvalidTransition { .. }) => {
                    tracing::debug!("stale candidate '{}' moved on, skipping", task.id);
                    report.skipped.push(task.id);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }

    /// Sweeps forever on the given interval, logging each report. Errors
    /// are logged and the loop keeps going; a broken sweep must not take
    /// the reclaimer down.
    pub async fn run(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(report) => {
                    if !report.requeued.is_empty() || !report.skipped.is_empty() {
                        tracing::info!(
                            "sweep: examined {}, requeued {:?}, skipped {:?}",
                            report.examined,
                            report.requeued,
                            report.skipped
                        );
                    }
                }
                Err(err) => tracing::warn!("reclamation sweep failed: {}", err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::LivenessRegistry;
    use crate::task::Task;
    use crate::testing::{MemoryBoardStore, MemoryLivenessRegistry, MemoryLockManager};

    fn fixture() -> (
        Arc<LifecycleEngine>,
        Arc<MemoryLivenessRegistry>,
        StaleReclaimer,
    ) {
        let boards = Arc::new(MemoryBoardStore::new());
        let locks = Arc::new(MemoryLockManager::new());
        let engine = Arc::new(LifecycleEngine::new(boards, locks, "reclaimer-test"));
        let liveness = Arc::new(MemoryLivenessRegistry::new());
        let config = CorralConfig {
            heartbeat_ttl_secs: 60,
            ..Default::default()
        };
        let reclaimer = StaleReclaimer::new(engine.clone(), liveness.clone(), &config);
        (engine, liveness, reclaimer)
    }

    #[tokio::test]
    async fn test_sweep_requeues_silent_worker() {
        let (engine, liveness, reclaimer) = fixture();
        engine
            .create(Task::new("t-1", "stale work", "test"))
            .await
            .unwrap();
        engine.claim("t-1", "w-1").await.unwrap();
        // Heartbeat well past the 60s TTL.
        liveness.set("w-1", Utc::now() - ChronoDuration::seconds(300));

        let report = reclaimer.sweep().await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.requeued, vec!["t-1".to_string()]);

        let (board, task) = engine.get("t-1").await.unwrap();
        assert_eq!(board, BoardKind::Backlog);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.assigned_to.is_none());
        assert!(task.notes.iter().any(|n| n.text.contains("stale")));
    }

    #[tokio::test]
    async fn test_sweep_spares_live_worker() {
        let (engine, liveness, reclaimer) = fixture();
        engine
            .create(Task::new("t-1", "live work", "test"))
            .await
            .unwrap();
        engine.claim("t-1", "w-1").await.unwrap();
        liveness.heartbeat("w-1").await.unwrap();

        let report = reclaimer.sweep().await.unwrap();
        assert_eq!(report.examined, 1);
        assert!(report.requeued.is_empty());

        let (board, _) = engine.get("t-1").await.unwrap();
        assert_eq!(board, BoardKind::Working);
    }

    #[tokio::test]
    async fn test_empty_registry_means_everything_is_stale() {
        let (engine, _liveness, reclaimer) = fixture();
        engine
            .create(Task::new("t-1", "orphaned work", "test"))
            .await
            .unwrap();
        engine.claim("t-1", "w-1").await.unwrap();

        let report = reclaimer.sweep().await.unwrap();
        assert_eq!(report.requeued, vec!["t-1".to_string()]);
    }

    #[tokio::test]
    async fn test_full_reassignment_scenario() {
        // T1 claimed by W1, W1 goes silent, reclaimer requeues, W2 claims.
        let (engine, liveness, reclaimer) = fixture();
        engine
            .create(Task::new("T1", "important work", "test"))
            .await
            .unwrap();
        engine.claim("T1", "W1").await.unwrap();
        liveness.set("W1", Utc::now() - ChronoDuration::seconds(600));

        reclaimer.sweep().await.unwrap();

        let claimed = engine.claim("T1", "W2").await.unwrap();
        assert_eq!(claimed.assigned_to.as_deref(), Some("W2"));
        assert_eq!(claimed.status, TaskStatus::Working);
    }
}
