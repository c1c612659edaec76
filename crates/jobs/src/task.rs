use std::{sync::Arc, time::Duration};

use roster_core::{
    ActivitySource, ActivityStore,
    config::RefreshConfig,
    models::{ActivitySnapshot, MemberRef},
};
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::{
    error::TaskError,
    merge::{build_patch, merge},
};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TaskOptions {
    pub timeout: Duration,
    pub repo_limit: usize,
    pub language_repo_limit: usize,
}

impl From<&RefreshConfig> for TaskOptions {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            timeout: config.task_timeout(),
            repo_limit: config.repo_limit,
            language_repo_limit: config.language_repo_limit,
        }
    }
}

/// Result of refreshing one member. Produced exactly once per member per job.
#[derive(Debug)]
pub struct TaskOutcome {
    pub member_id: String,
    pub result: Result<(), TaskError>,
}

impl TaskOutcome {
    pub fn is_ok(&self) -> bool { self.result.is_ok() }
}

/// Refreshes a single member against a logical deadline.
pub struct TaskRunner<F, S> {
    source: Arc<F>,
    store: Arc<S>,
    options: TaskOptions,
}

impl<F, S> Clone for TaskRunner<F, S> {
    fn clone(&self) -> Self {
        Self { source: self.source.clone(), store: self.store.clone(), options: self.options }
    }
}

impl<F, S> TaskRunner<F, S>
where
    F: ActivitySource,
    S: ActivityStore,
{
    pub fn new(source: Arc<F>, store: Arc<S>, options: TaskOptions) -> Self {
        Self { source, store, options }
    }

    pub fn options(&self) -> &TaskOptions { &self.options }

    /// Run the refresh pipeline for `member`. Never fails: every failure is
    /// reported through [`TaskOutcome::result`].
    ///
    /// The pipeline runs as its own task. If it misses the deadline it keeps
    /// running in the background and may still persist its result.
    pub async fn run(&self, member: &MemberRef) -> TaskOutcome {
        let member_id = member.id.clone();
        let mut handle = tokio::spawn(refresh_member(
            self.source.clone(),
            self.store.clone(),
            member.clone(),
            self.options,
        ));
        let result = match tokio::time::timeout(self.options.timeout, &mut handle).await {
            Ok(Ok(Ok(_))) => {
                tracing::debug!("Refreshed {}", member_id);
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(TaskError::Panicked(e.to_string())),
            Err(_) => {
                tokio::spawn(watch_late_completion(member_id.clone(), handle));
                Err(TaskError::Timeout(self.options.timeout))
            }
        };
        if let Err(e) = &result {
            tracing::error!("Failed to refresh {}: {}", member_id, e);
        }
        TaskOutcome { member_id, result }
    }
}

async fn refresh_member<F, S>(
    source: Arc<F>,
    store: Arc<S>,
    member: MemberRef,
    options: TaskOptions,
) -> Result<ActivitySnapshot, TaskError>
where
    F: ActivitySource,
    S: ActivityStore,
{
    let login = member.external_id.as_str();
    let snapshot = source.fetch_snapshot(login).await;
    let repos = source.fetch_repositories(login, options.repo_limit).await;
    let languages = source.fetch_languages(login, options.language_repo_limit).await;
    let patch = build_patch(snapshot, repos.as_deref(), languages, OffsetDateTime::now_utc());

    let existing =
        store.get_activity(&member.id).await.map_err(TaskError::Load)?.unwrap_or_default();
    let merged = merge(&existing, patch);
    store.merge_activity(&member.id, &merged).await.map_err(TaskError::Persist)?;
    Ok(merged)
}

/// Observe a pipeline that outlived its deadline. Its outcome was already
/// counted as a timeout, so this only logs.
async fn watch_late_completion(
    member_id: String,
    handle: JoinHandle<Result<ActivitySnapshot, TaskError>>,
) {
    match handle.await {
        Ok(Ok(_)) => {
            tracing::warn!("Refresh of {} finished after its deadline; result persisted", member_id)
        }
        Ok(Err(e)) => tracing::warn!("Refresh of {} failed after its deadline: {}", member_id, e),
        Err(e) => tracing::warn!("Refresh of {} panicked after its deadline: {}", member_id, e),
    }
}
