//! Progress tracking for a refresh job.

use std::{fmt, sync::Arc};

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Completed,
    /// Setup failed before any batch started.
    Aborted,
}

/// Counters of one job run.
///
/// `completed <= total` and `errors <= completed` always hold, and
/// `completed` never decreases while the job runs.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct JobState {
    pub status: JobStatus,
    pub completed: usize,
    pub errors: usize,
    pub total: usize,
}

impl JobState {
    /// Whole percentage of settled tasks. An empty job is fully done.
    pub fn percent(&self) -> u8 {
        if self.total == 0 { 100 } else { (self.completed * 100 / self.total) as u8 }
    }

    pub fn remaining(&self) -> usize { self.total - self.completed }

    pub fn succeeded(&self) -> usize { self.completed - self.errors }
}

/// Emitted once per settled task.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    pub message: String,
}

/// Emitted once when a job completes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct JobSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Refresh complete. Updated: {}, Errors: {}", self.succeeded, self.failed)
    }
}

/// Receiver of progress notifications, e.g. a UI.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);

    fn on_job_complete(&self, summary: &JobSummary);
}

/// Writes progress to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn on_progress(&self, update: &ProgressUpdate) {
        tracing::info!(
            completed = update.completed,
            total = update.total,
            "[{:>3}%] {}",
            update.percent,
            update.message
        );
    }

    fn on_job_complete(&self, summary: &JobSummary) { tracing::info!("{}", summary) }
}

/// Owns the [`JobState`] of a run and forwards every change to a sink and to
/// [`watch`] subscribers.
pub struct ProgressReporter {
    state: JobState,
    sink: Arc<dyn ProgressSink>,
    watch: watch::Sender<JobState>,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        let (watch, _) = watch::channel(JobState::default());
        Self { state: JobState::default(), sink, watch }
    }

    /// Begin a run over `total` tasks, resetting the counters.
    pub fn start(&mut self, total: usize) {
        self.set(JobState { status: JobStatus::Running, completed: 0, errors: 0, total });
    }

    /// Record one settled task. Returns the emitted update, or `None` if the
    /// settle was rejected because it would break the counter invariants.
    pub fn on_task_settled(&mut self, member_id: &str, ok: bool) -> Option<ProgressUpdate> {
        if self.state.status != JobStatus::Running {
            tracing::warn!("Ignoring result for {} outside of a running job", member_id);
            return None;
        }
        if self.state.completed >= self.state.total {
            tracing::warn!("Ignoring extra result for {}: all tasks already settled", member_id);
            return None;
        }
        let mut state = self.state;
        state.completed += 1;
        if !ok {
            state.errors += 1;
        }
        self.set(state);
        let message = if ok {
            format!("Updated {member_id}")
        } else {
            format!("Failed to update {member_id}")
        };
        let update = ProgressUpdate {
            completed: state.completed,
            total: state.total,
            percent: state.percent(),
            message,
        };
        self.sink.on_progress(&update);
        Some(update)
    }

    /// Mark the run completed and emit the completion signal.
    pub fn complete(&mut self) -> JobSummary {
        let mut state = self.state;
        state.status = JobStatus::Completed;
        self.set(state);
        let summary =
            JobSummary { succeeded: state.succeeded(), failed: state.errors, total: state.total };
        self.sink.on_job_complete(&summary);
        summary
    }

    /// Mark the run aborted before any task was started.
    pub fn abort(&mut self) {
        self.set(JobState { status: JobStatus::Aborted, ..JobState::default() });
    }

    pub fn snapshot(&self) -> JobState { self.state }

    /// Live view of the job state.
    pub fn subscribe(&self) -> watch::Receiver<JobState> { self.watch.subscribe() }

    /// Reset to idle between independent runs.
    pub fn clear(&mut self) { self.set(JobState::default()) }

    fn set(&mut self, state: JobState) {
        self.state = state;
        self.watch.send_replace(state);
    }
}
