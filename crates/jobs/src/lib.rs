pub mod aggregate;
pub mod error;
pub mod merge;
pub mod progress;
pub mod scheduler;
pub mod task;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use roster_core::{
    ActivitySource, ActivityStore,
    config::RefreshConfig,
    models::{AggregateSummary, MemberRef},
};

pub use crate::error::{RefreshError, TaskError};
use crate::{
    progress::{JobState, JobSummary, ProgressReporter},
    scheduler::BatchScheduler,
    task::{TaskOptions, TaskRunner},
};

/// Result of a completed refresh job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub state: JobState,
    pub summary: JobSummary,
    /// The recomputed summary, or `None` if the recompute failed.
    pub aggregate: Option<AggregateSummary>,
}

/// Refreshes member activity and recomputes the aggregate summary.
pub struct RefreshEngine<F, S> {
    store: Arc<S>,
    scheduler: BatchScheduler<F, S>,
    summary_key: String,
}

impl<F, S> RefreshEngine<F, S>
where
    F: ActivitySource,
    S: ActivityStore,
{
    pub fn new(source: Arc<F>, store: Arc<S>, config: &RefreshConfig) -> Self {
        let runner = TaskRunner::new(source, store.clone(), TaskOptions::from(config));
        Self {
            store,
            scheduler: BatchScheduler::new(
                runner,
                config.batch_size(),
                config.inter_batch_delay(),
            ),
            summary_key: config.summary_key.clone(),
        }
    }

    /// Refresh every connected member.
    ///
    /// Fails only if the member list cannot be read, in which case no batch
    /// is started and the job is marked aborted.
    pub async fn run(&self, progress: &mut ProgressReporter) -> Result<JobOutcome, RefreshError> {
        let members = match self.store.list_members().await {
            Ok(members) => members,
            Err(e) => {
                tracing::error!("Failed to list members: {:?}", e);
                progress.abort();
                return Err(RefreshError::Setup(e));
            }
        };
        let listed = members.len();
        let members = members.into_iter().filter(MemberRef::is_refreshable).collect::<Vec<_>>();
        if members.len() < listed {
            tracing::info!("Skipping {} members without a linked account", listed - members.len());
        }
        Ok(self.run_members(&members, progress).await)
    }

    /// Refresh the given members in order, then recompute the summary.
    ///
    /// Task failures and a failed recompute are logged and reflected in the
    /// outcome; the job itself always completes.
    pub async fn run_members(
        &self,
        members: &[MemberRef],
        progress: &mut ProgressReporter,
    ) -> JobOutcome {
        tracing::info!("Starting refresh of {} members", members.len());
        self.scheduler.run(members, progress).await;
        let aggregate = match aggregate::recalculate(self.store.as_ref(), &self.summary_key).await
        {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::error!("{:?}", e);
                None
            }
        };
        let summary = progress.complete();
        JobOutcome { state: progress.snapshot(), summary, aggregate }
    }
}
