use clap::Subcommand;

use corral_core::ports::LockManager;
use corral_core::Result;

use super::Context;

#[derive(Subcommand)]
pub enum LockAction {
    /// Remove an expired lock sentinel
    Release {
        /// Resource name, e.g. board-backlog
        resource: String,
    },
}

pub async fn run(ctx: &Context, action: LockAction) -> Result<()> {
    match action {
        LockAction::Release { resource } => {
            if ctx.locks.force_release(&resource).await? {
                println!("released expired lock on '{resource}'");
            } else {
                println!("no lock held on '{resource}'");
            }
            Ok(())
        }
    }
}
