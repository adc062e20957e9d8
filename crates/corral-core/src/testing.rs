//! In-memory fakes for the port traits, used by the engine and reclaimer
//! unit tests. The file-backed implementations live in
//! corral-infrastructure and have their own tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::board::BoardKind;
use crate::error::Result;
use crate::ports::{BoardStore, HeldLock, LivenessRegistry, LockGuard, LockManager};
use crate::task::Task;

/// Board storage held in a process-local map.
pub(crate) struct MemoryBoardStore {
    boards: Mutex<HashMap<BoardKind, Vec<Task>>>,
}

impl MemoryBoardStore {
    pub(crate) fn new() -> Self {
        Self {
            boards: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BoardStore for MemoryBoardStore {
    async fn read(&self, board: BoardKind) -> Result<Vec<Task>> {
        Ok(self
            .boards
            .lock()
            .unwrap()
            .get(&board)
            .cloned()
            .unwrap_or_default())
    }

    async fn write(&self, board: BoardKind, tasks: &[Task]) -> Result<()> {
        for task in tasks {
            task.validate()?;
        }
        self.boards
            .lock()
            .unwrap()
            .insert(board, tasks.to_vec());
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryLockGuard {
    resource: String,
    holder: String,
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

impl HeldLock for MemoryLockGuard {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn holder(&self) -> &str {
        &self.holder
    }
}

/// Lock manager backed by per-resource tokio mutexes. Provides real mutual
/// exclusion between concurrent tasks, but no lease expiry.
pub(crate) struct MemoryLockManager {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MemoryLockManager {
    pub(crate) fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl LockManager for MemoryLockManager {
    async fn acquire(&self, resource: &str, holder: &str) -> Result<LockGuard> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap();
            locks
                .entry(resource.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let guard = mutex.lock_owned().await;
        Ok(Box::new(MemoryLockGuard {
            resource: resource.to_string(),
            holder: holder.to_string(),
            _guard: guard,
        }))
    }

    async fn force_release(&self, _resource: &str) -> Result<bool> {
        // In-memory locks cannot outlive their holder.
        Ok(false)
    }
}

/// Heartbeat registry held in a process-local map, with a backdating
/// helper so tests can simulate silent workers.
pub(crate) struct MemoryLivenessRegistry {
    map: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl MemoryLivenessRegistry {
    pub(crate) fn new() -> Self {
        Self {
            map: Mutex::new(BTreeMap::new()),
        }
    }

    /// Sets a worker's heartbeat to an arbitrary instant.
    pub(crate) fn set(&self, worker_id: &str, at: DateTime<Utc>) {
        self.map.lock().unwrap().insert(worker_id.to_string(), at);
    }
}

#[async_trait]
impl LivenessRegistry for MemoryLivenessRegistry {
    async fn heartbeat(&self, worker_id: &str) -> Result<()> {
        self.set(worker_id, Utc::now());
        Ok(())
    }

    async fn snapshot(&self) -> Result<BTreeMap<String, DateTime<Utc>>> {
        Ok(self.map.lock().unwrap().clone())
    }

    async fn remove(&self, worker_id: &str) -> Result<()> {
        self.map.lock().unwrap().remove(worker_id);
        Ok(())
    }
}
