use std::time::Duration;

use futures_util::{StreamExt, stream::FuturesUnordered};
use roster_core::{ActivitySource, ActivityStore, models::MemberRef};

use crate::{
    progress::{JobState, ProgressReporter},
    task::TaskRunner,
};

/// Runs members through a [`TaskRunner`] in sequential, bounded batches.
pub struct BatchScheduler<F, S> {
    runner: TaskRunner<F, S>,
    batch_size: usize,
    inter_batch_delay: Duration,
}

impl<F, S> BatchScheduler<F, S>
where
    F: ActivitySource,
    S: ActivityStore,
{
    /// A `batch_size` of zero is treated as one.
    pub fn new(runner: TaskRunner<F, S>, batch_size: usize, inter_batch_delay: Duration) -> Self {
        Self { runner, batch_size: batch_size.max(1), inter_batch_delay }
    }

    pub fn batch_size(&self) -> usize { self.batch_size }

    /// Consecutive groups of at most `batch_size` members, in input order.
    pub fn batches<'a>(&self, members: &'a [MemberRef]) -> std::slice::Chunks<'a, MemberRef> {
        members.chunks(self.batch_size)
    }

    /// Refresh every member, reporting each settled task to `progress`.
    ///
    /// Each batch runs concurrently and must fully settle before the next one
    /// starts. Task failures never stop the run.
    pub async fn run(&self, members: &[MemberRef], progress: &mut ProgressReporter) -> JobState {
        progress.start(members.len());
        let batch_count = self.batches(members).len();
        for (i, batch) in self.batches(members).enumerate() {
            tracing::info!("Refreshing batch {}/{} ({} members)", i + 1, batch_count, batch.len());
            let mut pending =
                batch.iter().map(|member| self.runner.run(member)).collect::<FuturesUnordered<_>>();
            while let Some(outcome) = pending.next().await {
                progress.on_task_settled(&outcome.member_id, outcome.is_ok());
            }
            if i + 1 < batch_count && !self.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
        }
        progress.snapshot()
    }
}
