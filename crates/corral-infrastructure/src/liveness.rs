//! File-backed liveness registry.
//!
//! A single shared JSON map of `worker_id -> last_heartbeat`. Heartbeats
//! are a read-modify-write on the map, serialized through the `liveness`
//! lease lock; snapshots are lock-free reads of the atomically-replaced
//! file.
//!
//! The registry is soft state: it is rebuilt by the next round of
//! heartbeats, so unreadable content degrades to an empty map (which makes
//! every assignment look stale, the safe direction) instead of failing the
//! caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use corral_core::error::Result;
use corral_core::ports::{LivenessRegistry, LockManager};

use crate::atomic_json::AtomicJsonFile;
use crate::paths::CorralPaths;

/// Lease lock resource guarding the registry file.
pub const LIVENESS_RESOURCE: &str = "liveness";

type HeartbeatMap = BTreeMap<String, DateTime<Utc>>;

/// Liveness registry over the shared data directory.
pub struct FileLivenessRegistry {
    paths: CorralPaths,
    locks: Arc<dyn LockManager>,
    /// Lock holder identity for heartbeat writes.
    holder: String,
}

impl FileLivenessRegistry {
    pub fn new(paths: CorralPaths, locks: Arc<dyn LockManager>, holder: impl Into<String>) -> Self {
        Self {
            paths,
            locks,
            holder: holder.into(),
        }
    }

    fn file(&self) -> AtomicJsonFile<HeartbeatMap> {
        AtomicJsonFile::new(self.paths.liveness_file())
    }

    fn load_or_empty(&self) -> HeartbeatMap {
        match self.file().load() {
            Ok(Some(map)) => map,
            Ok(None) => HeartbeatMap::new(),
            Err(err) => {
                tracing::warn!("liveness registry unreadable, treating as empty: {}", err);
                HeartbeatMap::new()
            }
        }
    }
}

#[async_trait]
impl LivenessRegistry for FileLivenessRegistry {
    async fn heartbeat(&self, worker_id: &str) -> Result<()> {
        let _guard = self.locks.acquire(LIVENESS_RESOURCE, &self.holder).await?;
        let mut map = self.load_or_empty();
        map.insert(worker_id.to_string(), Utc::now());
        self.file().save(&map)?;
        tracing::debug!("heartbeat recorded for '{}'", worker_id);
        Ok(())
    }

    async fn snapshot(&self) -> Result<HeartbeatMap> {
        Ok(self.load_or_empty())
    }

    async fn remove(&self, worker_id: &str) -> Result<()> {
        let _guard = self.locks.acquire(LIVENESS_RESOURCE, &self.holder).await?;
        let mut map = self.load_or_empty();
        if map.remove(worker_id).is_some() {
            self.file().save(&map)?;
            tracing::debug!("removed liveness record for '{}'", worker_id);
        }
        Ok(())
    }
}
