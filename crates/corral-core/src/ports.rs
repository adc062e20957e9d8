//! Port traits implemented by the infrastructure layer.
//!
//! These decouple the lifecycle engine and reclaimer from the concrete
//! file-backed storage, so the core logic can be tested against in-memory
//! fakes. Every operation takes its dependencies explicitly; there are no
//! process-wide singletons.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::board::BoardKind;
use crate::error::Result;
use crate::message::Message;
use crate::task::Task;

/// Durable, schema-validated storage for the three board files.
///
/// Implementations must write atomically (temp file + rename, never in
/// place) and must surface malformed content as `BoardCorruption` rather
/// than silently truncating it. Mutation is only legal while the board's
/// lease lock is held; the engine enforces that, not the store.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Reads the full task list of a board.
    ///
    /// A missing or empty board file yields an empty list.
    async fn read(&self, board: BoardKind) -> Result<Vec<Task>>;

    /// Replaces the board content atomically.
    ///
    /// Every task is validated first; a schema failure aborts the write
    /// with prior content untouched.
    async fn write(&self, board: BoardKind, tasks: &[Task]) -> Result<()>;
}

/// A held lease lock. Dropping the guard releases the lock on every exit
/// path, including errors and timeouts mid-operation.
pub trait HeldLock: Send + std::fmt::Debug {
    /// Resource the lock guards.
    fn resource(&self) -> &str;
    /// Identity the lease was issued to.
    fn holder(&self) -> &str;
}

/// Owned handle to a held lease lock.
pub type LockGuard = Box<dyn HeldLock>;

/// Advisory mutual exclusion with lease expiry over named resources.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquires the lock, retrying with backoff until the configured
    /// timeout elapses (`LockTimeout` thereafter). A lock whose lease has
    /// expired counts as abandoned and may be taken over.
    async fn acquire(&self, resource: &str, holder: &str) -> Result<LockGuard>;

    /// Removes an expired lock sentinel. Returns false if no lock exists;
    /// errors if the lease is still live.
    async fn force_release(&self, resource: &str) -> Result<bool>;
}

/// Shared registry of worker heartbeats, read by the stale reclaimer.
#[async_trait]
pub trait LivenessRegistry: Send + Sync {
    /// Records `worker_id -> now`. Called by each worker on a fixed cadence.
    async fn heartbeat(&self, worker_id: &str) -> Result<()>;

    /// Snapshot of all recorded heartbeats. A missing registry yields an
    /// empty map (every assignment then counts as stale).
    async fn snapshot(&self) -> Result<BTreeMap<String, DateTime<Utc>>>;

    /// Drops a worker's record, e.g. on clean shutdown.
    async fn remove(&self, worker_id: &str) -> Result<()>;
}

/// Per-worker durable inbox/archive pair for point-to-point messages.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Delivers a message into the recipient's inbox atomically; a message
    /// is never observed half-written.
    async fn send(&self, message: &Message) -> Result<()>;

    /// Lists the recipient's inbox, ordered by message id.
    async fn receive(&self, recipient: &str) -> Result<Vec<Message>>;

    /// Moves a message from inbox to archive. Idempotent: archiving a
    /// missing or already-archived message is a no-op.
    async fn archive(&self, recipient: &str, message_id: &str) -> Result<()>;
}
