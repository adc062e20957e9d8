use tracing::info;

use corral_core::{Result, StaleReclaimer};

use super::Context;

pub async fn run(ctx: &Context, follow: bool) -> Result<()> {
    let reclaimer = StaleReclaimer::new(ctx.engine.clone(), ctx.liveness.clone(), &ctx.config);

    if follow {
        info!(
            interval_secs = ctx.config.sweep_interval_secs,
            "starting reclaim loop"
        );
        reclaimer.run(ctx.config.sweep_interval()).await;
        return Ok(());
    }

    let report = reclaimer.sweep().await?;
    println!("examined {}", report.examined);
    for task_id in &report.requeued {
        println!("requeued {task_id}");
    }
    for task_id in &report.skipped {
        println!("skipped  {task_id}");
    }
    Ok(())
}
