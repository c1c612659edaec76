use std::time::Duration;

/// Why a single member's refresh was counted as failed.
///
/// Fetch failures are not represented here: the source degrades them to
/// missing data and the task still succeeds.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("failed to load existing activity: {0:#}")]
    Load(#[source] anyhow::Error),
    #[error("failed to persist activity: {0:#}")]
    Persist(#[source] anyhow::Error),
    #[error("refresh task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn is_timeout(&self) -> bool { matches!(self, Self::Timeout(_)) }
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The member list could not be read; no batch was started.
    #[error("failed to list members: {0:#}")]
    Setup(#[source] anyhow::Error),
    /// The summary could not be recomputed. Per-member results still stand.
    #[error("failed to recalculate summary: {0:#}")]
    Aggregate(#[source] anyhow::Error),
}
