//! File-backed lease lock.
//!
//! Mutual exclusion over a named resource, mediated by a sentinel file in
//! the shared locks directory. The sentinel records who holds the lease
//! and when it expires; a crashed holder therefore blocks nobody for
//! longer than one lease duration. Acquisition is an exclusive file
//! create, which the filesystem arbitrates: of any number of concurrent
//! acquirers, exactly one wins.
//!
//! Taking over an expired lease is a two-step protocol keyed on the
//! sentinel's inode. A stealer first claims an exclusive takeover marker
//! for that inode, then re-checks that the same stale file still occupies
//! the lock path before removing it. Only one stealer can hold the marker
//! for a given inode, and a marker holder never removes a file it did not
//! re-validate, so a slot that has been re-acquired in the meantime cannot
//! be freed out from under the new lease holder.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read as IoRead, Write as IoWrite};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use corral_core::config::CorralConfig;
use corral_core::error::{CorralError, Result};
use corral_core::ports::{HeldLock, LockGuard, LockManager};

use crate::paths::CorralPaths;

/// On-disk record of a held lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSentinel {
    pub resource: String,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockSentinel {
    /// A lease past its expiry counts as abandoned; any process may take
    /// the lock over.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Reads the current occupant of a lock path through a single open file,
/// so the returned inode and content describe the same file even when the
/// path is replaced concurrently. `None` content means the file exists but
/// does not parse (a writer died mid-write); it is treated like an expired
/// lease.
fn open_occupant(path: &Path) -> Result<Option<(u64, Option<LockSentinel>)>> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let ino = file.metadata()?.ino();
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(Some((ino, serde_json::from_slice(&bytes).ok())))
}

/// Lease lock manager over the shared locks directory.
pub struct FileLeaseLock {
    paths: CorralPaths,
    lease_duration: Duration,
    acquire_timeout: Duration,
}

impl FileLeaseLock {
    /// Creates a lock manager with the configured lease duration and
    /// acquisition budget.
    pub fn new(paths: CorralPaths, config: &CorralConfig) -> Self {
        Self {
            paths,
            lease_duration: config.lease_duration(),
            acquire_timeout: config.lock_timeout(),
        }
    }

    /// Overrides the lease duration (mainly for tests).
    pub fn with_lease_duration(mut self, lease_duration: Duration) -> Self {
        self.lease_duration = lease_duration;
        self
    }

    /// Overrides the acquisition budget (mainly for tests).
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// Attempts the exclusive create. Returns the new sentinel file's
    /// inode on success, `None` when the sentinel already exists.
    fn try_create(&self, path: &Path, sentinel: &LockSentinel) -> Result<Option<u64>> {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(mut file) => {
                let json = serde_json::to_string_pretty(sentinel)?;
                file.write_all(json.as_bytes())?;
                file.sync_all()?;
                Ok(Some(file.metadata()?.ino()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Takeover marker path for one specific stale sentinel file.
    fn steal_marker(&self, resource: &str, ino: u64) -> PathBuf {
        self.paths.locks_dir().join(format!("{resource}.steal-{ino}"))
    }

    /// Attempts to free the slot occupied by the stale sentinel with the
    /// given inode. The exclusive marker elects a single stealer for that
    /// inode; the winner re-validates that the same inode still holds an
    /// expired or garbled sentinel before removing it. Returns true when
    /// the slot was freed.
    fn try_steal(&self, resource: &str, path: &Path, ino: u64) -> Result<bool> {
        let marker = self.steal_marker(resource, ino);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
        {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        let stale = match open_occupant(path) {
            Ok(Some((current_ino, sentinel))) => {
                current_ino == ino
                    && match sentinel {
                        Some(sentinel) => sentinel.is_expired(),
                        None => true,
                    }
            }
            Ok(None) => false,
            Err(err) => {
                let _ = fs::remove_file(&marker);
                return Err(err);
            }
        };

        if stale {
            let _ = fs::remove_file(path);
        }
        let _ = fs::remove_file(&marker);
        Ok(stale)
    }

    /// Removes every takeover marker left for a resource.
    fn remove_steal_markers(&self, resource: &str) -> Result<()> {
        let entries = match fs::read_dir(self.paths.locks_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let prefix = format!("{resource}.steal-");
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LockManager for FileLeaseLock {
    async fn acquire(&self, resource: &str, holder: &str) -> Result<LockGuard> {
        let path = self.paths.lock_file(resource);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lease = ChronoDuration::from_std(self.lease_duration)
            .unwrap_or_else(|_| ChronoDuration::seconds(30));
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let now = Utc::now();
            let sentinel = LockSentinel {
                resource: resource.to_string(),
                holder: holder.to_string(),
                acquired_at: now,
                expires_at: now + lease,
            };

            if let Some(ino) = self.try_create(&path, &sentinel)? {
                tracing::debug!("'{}' acquired lock '{}'", holder, resource);
                return Ok(Box::new(FileLockGuard {
                    path,
                    ino,
                    resource: resource.to_string(),
                    holder: holder.to_string(),
                }));
            }

            // Occupied. An expired or garbled sentinel is abandoned and
            // goes through the takeover marker; losing the marker means
            // another stealer is already on it, so back off like any
            // other waiter.
            match open_occupant(&path)? {
                Some((_, Some(existing))) if !existing.is_expired() => {}
                Some((ino, _)) => {
                    if self.try_steal(resource, &path, ino)? {
                        tracing::debug!("took over stale lock sentinel for '{}'", resource);
                        continue;
                    }
                }
                // Freed between the create and the read; retry at once.
                None => continue,
            }

            let waited = start.elapsed();
            if waited >= self.acquire_timeout {
                return Err(CorralError::lock_timeout(resource, waited.as_millis() as u64));
            }

            // Exponential backoff with jitter so contending processes
            // don't synchronize their retries.
            let base_ms = 10u64 * (1 << attempt.min(5));
            let jitter = rand::thread_rng().gen_range(0..=base_ms / 2);
            tokio::time::sleep(Duration::from_millis(base_ms + jitter)).await;
            attempt += 1;
        }
    }

    async fn force_release(&self, resource: &str) -> Result<bool> {
        let path = self.paths.lock_file(resource);
        let occupant = open_occupant(&path)?;
        if let Some((_, Some(sentinel))) = &occupant {
            if !sentinel.is_expired() {
                return Err(CorralError::Internal(format!(
                    "lock '{}' is still held by '{}' until {}",
                    resource, sentinel.holder, sentinel.expires_at
                )));
            }
        }

        // Manual recovery path: a stealer that died between claiming its
        // marker and freeing the slot wedges takeover for this resource,
        // so stray markers are cleared before the removal below.
        self.remove_steal_markers(resource)?;

        match occupant {
            None => Ok(false),
            Some((ino, _)) => {
                let freed = self.try_steal(resource, &path, ino)?;
                if freed {
                    tracing::info!("force-released expired lock '{}'", resource);
                }
                Ok(freed)
            }
        }
    }
}

/// Guard for a held lease. Dropping it releases the lock, so release
/// happens on every exit path.
#[derive(Debug)]
struct FileLockGuard {
    path: PathBuf,
    /// Inode of the sentinel this guard created.
    ino: u64,
    resource: String,
    holder: String,
}

impl HeldLock for FileLockGuard {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn holder(&self) -> &str {
        &self.holder
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        // Remove the sentinel only while it is provably still ours: same
        // file (inode), same holder, lease not yet expired. An expired
        // sentinel belongs to the takeover protocol, which is the only
        // party allowed to remove it.
        if let Ok(Some((ino, Some(sentinel)))) = open_occupant(&self.path) {
            if ino == self.ino && sentinel.holder == self.holder && !sentinel.is_expired() {
                let _ = fs::remove_file(&self.path);
                tracing::debug!("'{}' released lock '{}'", self.holder, self.resource);
            }
        }
    }
}
