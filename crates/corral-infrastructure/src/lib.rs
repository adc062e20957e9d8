//! corral-infrastructure
//!
//! File-backed implementations of the corral-core port traits: the lease
//! lock, the board store, the liveness registry, and the mailbox, plus the
//! shared data-directory layout and the atomic JSON write primitive they
//! are all built on.

pub mod atomic_json;
pub mod board_store;
pub mod lease_lock;
pub mod liveness;
pub mod mailbox;
pub mod paths;

pub use crate::atomic_json::AtomicJsonFile;
pub use crate::board_store::FileBoardStore;
pub use crate::lease_lock::{FileLeaseLock, LockSentinel};
pub use crate::liveness::{FileLivenessRegistry, LIVENESS_RESOURCE};
pub use crate::mailbox::FileMailbox;
pub use crate::paths::CorralPaths;
