//! Combining freshly fetched activity with what is already stored.

use roster_core::models::{
    ActivityPatch, ActivitySnapshot, LanguageMap, ProfileSnapshot, RepoSummary,
};
use time::OffsetDateTime;

/// Totals derived from a member's repository list.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RepoTotals {
    pub stars: u64,
    pub forks: u64,
    pub private_repos: u64,
}

impl RepoTotals {
    /// Full recompute over the given repositories.
    pub fn from_repos(repos: &[RepoSummary]) -> Self {
        repos.iter().fold(Self::default(), |acc, repo| Self {
            stars: acc.stars.saturating_add(repo.stars),
            forks: acc.forks.saturating_add(repo.forks),
            private_repos: acc.private_repos + u64::from(repo.is_private),
        })
    }
}

/// Assemble a patch from the three lookups of a refresh.
///
/// `repos` and `languages` are `None` when their lookup failed, in which case
/// the fields they feed stay undefined and the stored values survive the merge.
/// `last_updated` is only set if at least one lookup produced data.
pub fn build_patch(
    snapshot: ProfileSnapshot,
    repos: Option<&[RepoSummary]>,
    languages: Option<LanguageMap>,
    now: OffsetDateTime,
) -> ActivityPatch {
    let fetched_any = !snapshot.is_empty() || repos.is_some() || languages.is_some();
    let totals = repos.map(RepoTotals::from_repos);
    ActivityPatch {
        public_repos: snapshot.public_repos,
        private_repos: totals.map(|t| t.private_repos),
        followers: snapshot.followers,
        following: snapshot.following,
        commits: snapshot.commits,
        pull_requests: snapshot.pull_requests,
        merged_prs: snapshot.merged_prs,
        open_prs: snapshot.open_prs,
        closed_prs: snapshot.closed_prs,
        issues: snapshot.issues,
        recent_prs: snapshot.recent_prs,
        total_stars: totals.map(|t| t.stars),
        total_forks: totals.map(|t| t.forks),
        languages,
        last_updated: fetched_any.then_some(now),
    }
}

/// Overlay `fresh` onto `existing`: defined fields replace, undefined fields
/// keep the existing value.
pub fn merge(existing: &ActivitySnapshot, fresh: ActivityPatch) -> ActivitySnapshot {
    ActivitySnapshot {
        public_repos: fresh.public_repos.unwrap_or(existing.public_repos),
        private_repos: fresh.private_repos.unwrap_or(existing.private_repos),
        followers: fresh.followers.unwrap_or(existing.followers),
        following: fresh.following.unwrap_or(existing.following),
        commits: fresh.commits.unwrap_or(existing.commits),
        pull_requests: fresh.pull_requests.unwrap_or(existing.pull_requests),
        merged_prs: fresh.merged_prs.unwrap_or(existing.merged_prs),
        open_prs: fresh.open_prs.unwrap_or(existing.open_prs),
        closed_prs: fresh.closed_prs.unwrap_or(existing.closed_prs),
        issues: fresh.issues.unwrap_or(existing.issues),
        recent_prs: fresh.recent_prs.unwrap_or_else(|| existing.recent_prs.clone()),
        total_stars: fresh.total_stars.unwrap_or(existing.total_stars),
        total_forks: fresh.total_forks.unwrap_or(existing.total_forks),
        languages: fresh.languages.unwrap_or_else(|| existing.languages.clone()),
        last_updated: fresh.last_updated.or(existing.last_updated),
    }
}
