//! corral-core
//!
//! Domain model and coordination logic for corral, a shared-filesystem
//! task coordination substrate. Independent worker processes claim,
//! execute, and complete tasks recorded on durable file-backed boards,
//! with no central database or lock server; the filesystem is the only
//! synchronization medium.
//!
//! This crate holds the task model and state machine, the error taxonomy,
//! the port traits implemented by `corral-infrastructure`, the lifecycle
//! engine, and the stale reclaimer.

pub mod board;
pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod ports;
pub mod reclaimer;
pub mod task;

// Re-export the common error type and the main entry points.
pub use board::BoardKind;
pub use config::CorralConfig;
pub use engine::LifecycleEngine;
pub use error::{CorralError, Result};
pub use message::Message;
pub use reclaimer::{StaleReclaimer, SweepReport};

#[cfg(test)]
pub(crate) mod testing;
