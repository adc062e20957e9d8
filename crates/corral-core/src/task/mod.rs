//! Task domain module.
//!
//! Contains the task record persisted on the boards, its status state
//! machine, and the patch type used for in-place updates.

mod model;

pub use model::{Task, TaskNote, TaskPatch, TaskPriority, TaskResult, TaskStatus};
