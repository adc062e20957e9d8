pub mod board;
pub mod lock;
pub mod mail;
pub mod reclaim;
pub mod task;

use std::sync::Arc;

use corral_core::ports::LivenessRegistry;
use corral_core::{CorralConfig, LifecycleEngine, Result};
use corral_infrastructure::{
    CorralPaths, FileBoardStore, FileLeaseLock, FileLivenessRegistry, FileMailbox,
};

/// Shared handles built once from the configuration.
pub struct Context {
    pub config: CorralConfig,
    pub engine: Arc<LifecycleEngine>,
    pub locks: Arc<FileLeaseLock>,
    pub liveness: Arc<FileLivenessRegistry>,
    pub mailbox: Arc<FileMailbox>,
}

impl Context {
    pub fn new(config: CorralConfig) -> Result<Self> {
        let paths = CorralPaths::new(config.data_dir.clone());
        paths.ensure_layout()?;

        let holder = format!("cli-{}", std::process::id());
        let boards = Arc::new(FileBoardStore::new(paths.clone()));
        let locks = Arc::new(FileLeaseLock::new(paths.clone(), &config));
        let engine = Arc::new(LifecycleEngine::new(
            boards,
            locks.clone(),
            holder.clone(),
        ));
        let liveness = Arc::new(FileLivenessRegistry::new(
            paths.clone(),
            locks.clone(),
            holder,
        ));
        let mailbox = Arc::new(FileMailbox::new(paths));

        Ok(Self {
            config,
            engine,
            locks,
            liveness,
            mailbox,
        })
    }
}

/// Records one heartbeat for a worker identity.
pub async fn heartbeat(ctx: &Context, worker_id: &str) -> Result<()> {
    ctx.liveness.heartbeat(worker_id).await?;
    println!("heartbeat recorded for {worker_id}");
    Ok(())
}
