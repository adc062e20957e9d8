use clap::Subcommand;
use uuid::Uuid;

use corral_core::task::{Task, TaskPriority, TaskResult};
use corral_core::Result;

use super::Context;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to the backlog
    Create {
        /// Task id; generated when omitted
        #[arg(long)]
        id: Option<String>,
        description: String,
        /// Routing tag consumed by workers
        #[arg(long, default_value = "general")]
        task_type: String,
        /// CRITICAL, HIGH, NORMAL, or LOW
        #[arg(long)]
        priority: Option<String>,
        /// Task ids that must complete first (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },
    /// Claim a backlog task for a worker
    Claim { task_id: String, worker_id: String },
    /// Record a task outcome and move it to the completed board
    Complete {
        task_id: String,
        #[arg(long, default_value = "done")]
        message: String,
        /// Record a failure with this code instead of a success
        #[arg(long)]
        error_code: Option<String>,
    },
    /// Return a working task to the backlog
    Requeue { task_id: String, reason: String },
    /// Move a terminal task back to the backlog
    Reopen { task_id: String },
    /// Print one task and the board it sits on
    Show { task_id: String },
}

pub async fn run(ctx: &Context, action: TaskAction) -> Result<()> {
    match action {
        TaskAction::Create {
            id,
            description,
            task_type,
            priority,
            depends_on,
        } => {
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let mut task = Task::new(id, description, task_type).with_dependencies(depends_on);
            if let Some(priority) = priority {
                task = task.with_priority(priority.parse::<TaskPriority>()?);
            }
            let task = ctx.engine.create(task).await?;
            println!("created {}", task.id);
            Ok(())
        }
        TaskAction::Claim { task_id, worker_id } => {
            let task = ctx.engine.claim(&task_id, &worker_id).await?;
            println!("{} claimed by {}", task.id, worker_id);
            Ok(())
        }
        TaskAction::Complete {
            task_id,
            message,
            error_code,
        } => {
            let result = match error_code {
                Some(error_code) => TaskResult::Error {
                    error_code,
                    message,
                    details: serde_json::Value::Null,
                },
                None => TaskResult::Success {
                    message,
                    data: serde_json::Value::Null,
                },
            };
            let task = ctx.engine.complete(&task_id, result).await?;
            println!("{} finished as {}", task.id, task.status);
            Ok(())
        }
        TaskAction::Requeue { task_id, reason } => {
            let task = ctx.engine.requeue(&task_id, &reason).await?;
            println!("{} returned to the backlog", task.id);
            Ok(())
        }
        TaskAction::Reopen { task_id } => {
            let task = ctx.engine.reopen(&task_id).await?;
            println!("{} reopened", task.id);
            Ok(())
        }
        TaskAction::Show { task_id } => {
            let (board, task) = ctx.engine.get(&task_id).await?;
            let doc = serde_json::json!({ "board": board, "task": task });
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
    }
}
