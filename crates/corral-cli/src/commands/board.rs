use clap::Subcommand;

use corral_core::{BoardKind, Result};

use super::Context;

#[derive(Subcommand)]
pub enum BoardAction {
    /// Print the tasks on a board
    Show {
        /// backlog, working, or completed
        board: String,
        /// Emit raw JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(ctx: &Context, action: BoardAction) -> Result<()> {
    match action {
        BoardAction::Show { board, json } => {
            let kind: BoardKind = board.parse()?;
            let tasks = ctx.engine.list(kind).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
                return Ok(());
            }

            if tasks.is_empty() {
                println!("board '{kind}' is empty");
                return Ok(());
            }
            for task in tasks {
                println!(
                    "{}  {:<8} {:<24} {:<12} {}",
                    task.id,
                    task.priority.to_string(),
                    task.status.to_string(),
                    task.assigned_to.as_deref().unwrap_or("-"),
                    task.description
                );
            }
            Ok(())
        }
    }
}
