use std::sync::Arc;

use anyhow::{Context, Result};
use argp::FromArgs;
use roster_core::config::Config;
use roster_jobs::{
    RefreshEngine,
    progress::{LogSink, ProgressReporter},
};
use tokio::sync::{Mutex, MutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::util::{Engine, open, shutdown_signal};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Refresh on a schedule until interrupted.
#[argp(subcommand, name = "schedule")]
pub struct Args {
    #[argp(switch)]
    /// also refresh once at startup
    now: bool,
}

pub async fn run(args: Args, config: &Config) -> Result<()> {
    let cron = config.schedule.clone().unwrap_or_default().cron;
    let (db, github) = open(config).await?;
    let engine = Arc::new(RefreshEngine::new(github, db.clone(), &config.refresh));
    // Held for the duration of a refresh
    let running = Arc::new(Mutex::new(()));

    let mut sched = JobScheduler::new().await?;
    {
        let engine = engine.clone();
        let running = running.clone();
        sched
            .add(
                Job::new_async(cron.as_str(), move |_uuid, _l| {
                    let engine = engine.clone();
                    let running = running.clone();
                    Box::pin(async move { refresh(&engine, &running).await })
                })
                .with_context(|| format!("Invalid schedule \"{}\"", cron))?,
            )
            .await?;
    }
    sched.start().await?;
    tracing::info!("Refreshing on schedule \"{}\"", cron);

    let initial = async {
        if args.now {
            refresh(&engine, &running).await;
        }
    };
    let ((), signal) = tokio::join!(initial, shutdown_signal());
    signal?;
    tracing::info!("Shutting down");
    sched.shutdown().await?;
    // Wait for an in-progress refresh to finish
    let _guard = running.lock().await;
    db.close().await;
    Ok(())
}

async fn refresh(engine: &Engine, running: &Mutex<()>) {
    let Some(_guard) = begin_run(running) else {
        return;
    };
    let mut progress = ProgressReporter::new(Arc::new(LogSink));
    if let Err(e) = engine.run(&mut progress).await {
        tracing::error!("Scheduled refresh failed: {:?}", e);
    }
}

/// Claim the run slot, or `None` if a refresh is already in progress.
fn begin_run(running: &Mutex<()>) -> Option<MutexGuard<'_, ()>> {
    let guard = running.try_lock().ok();
    if guard.is_none() {
        tracing::warn!("Previous refresh still running, skipping");
    }
    guard
}
