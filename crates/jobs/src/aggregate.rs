//! Collection-wide statistics over every member's activity.

use anyhow::Context;
use roster_core::{
    ActivityStore,
    models::{AggregateSummary, DEFAULT_EVENTS, MemberActivity},
};
use time::OffsetDateTime;

use crate::error::RefreshError;

/// Summarize `records`. `events` is not derived from member data and must be
/// carried over from the previous summary.
pub fn recompute(records: &[MemberActivity], events: u64, now: OffsetDateTime) -> AggregateSummary {
    let mut summary = AggregateSummary {
        members: records.len() as u64,
        members_with_external_link: 0,
        projects: 0,
        stars: 0,
        total_commits: 0,
        total_forks: 0,
        total_pull_requests: 0,
        calculated_at: now,
        last_updated: now,
        events,
    };
    let mut last_updated = None;
    for MemberActivity { member, activity } in records {
        summary.members_with_external_link += u64::from(member.connected);
        summary.projects = summary
            .projects
            .saturating_add(activity.public_repos)
            .saturating_add(activity.private_repos);
        summary.stars = summary.stars.saturating_add(activity.total_stars);
        summary.total_commits = summary.total_commits.saturating_add(activity.commits);
        summary.total_forks = summary.total_forks.saturating_add(activity.total_forks);
        summary.total_pull_requests =
            summary.total_pull_requests.saturating_add(activity.pull_requests);
        last_updated = last_updated.max(activity.last_updated);
    }
    if let Some(last_updated) = last_updated {
        summary.last_updated = last_updated;
    }
    summary
}

/// Recompute the summary stored under `key` from the current member activity.
pub async fn recalculate<S>(store: &S, key: &str) -> Result<AggregateSummary, RefreshError>
where S: ActivityStore {
    let records = store
        .list_member_activity()
        .await
        .context("Failed to list member activity")
        .map_err(RefreshError::Aggregate)?;
    let events = store
        .get_summary(key)
        .await
        .context("Failed to read existing summary")
        .map_err(RefreshError::Aggregate)?
        .map_or(DEFAULT_EVENTS, |summary| summary.events);
    let summary = recompute(&records, events, OffsetDateTime::now_utc());
    store
        .upsert_summary(key, &summary)
        .await
        .context("Failed to store summary")
        .map_err(RefreshError::Aggregate)?;
    tracing::info!(
        "Recalculated {} summary: {} members, {} projects, {} stars",
        key,
        summary.members,
        summary.projects,
        summary.stars
    );
    Ok(summary)
}
