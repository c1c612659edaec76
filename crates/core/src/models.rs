use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Number of pull requests kept in [`ActivitySnapshot::recent_prs`].
pub const RECENT_PR_LIMIT: usize = 5;

/// `events` value used when no summary has been recorded yet.
pub const DEFAULT_EVENTS: u64 = 10;

/// Language name to bytes of code.
pub type LanguageMap = BTreeMap<String, u64>;

/// A member profile as managed by an administrator.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    /// GitHub login, if the member linked an account.
    pub external_id: Option<String>,
}

/// The unit of work for a refresh job.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    pub id: String,
    pub external_id: String,
    pub connected: bool,
}

impl MemberRef {
    /// Whether the member can be refreshed from the external source.
    pub fn is_refreshable(&self) -> bool { self.connected && !self.external_id.is_empty() }
}

impl From<&Member> for MemberRef {
    fn from(value: &Member) -> Self {
        let external_id = value.external_id.clone().unwrap_or_default();
        Self { id: value.id.clone(), connected: !external_id.is_empty(), external_id }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }
}

impl FromStr for PullRequestState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "merged" => Ok(Self::Merged),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::Merged => "Merged",
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub title: String,
    pub url: String,
    /// `owner/name` of the target repository.
    pub repository: String,
    pub state: PullRequestState,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One repository as returned by the external source.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct RepoSummary {
    pub stars: u64,
    pub forks: u64,
    pub is_private: bool,
}

/// Persisted activity metrics for one member.
#[derive(Debug, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub public_repos: u64,
    pub private_repos: u64,
    pub followers: u64,
    pub following: u64,
    pub commits: u64,
    pub pull_requests: u64,
    pub merged_prs: u64,
    pub open_prs: u64,
    pub closed_prs: u64,
    pub issues: u64,
    pub recent_prs: Vec<PullRequestSummary>,
    pub total_stars: u64,
    pub total_forks: u64,
    pub languages: LanguageMap,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
}

/// A partial [`ActivitySnapshot`]. `None` means "not fetched this time".
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ActivityPatch {
    pub public_repos: Option<u64>,
    pub private_repos: Option<u64>,
    pub followers: Option<u64>,
    pub following: Option<u64>,
    pub commits: Option<u64>,
    pub pull_requests: Option<u64>,
    pub merged_prs: Option<u64>,
    pub open_prs: Option<u64>,
    pub closed_prs: Option<u64>,
    pub issues: Option<u64>,
    pub recent_prs: Option<Vec<PullRequestSummary>>,
    pub total_stars: Option<u64>,
    pub total_forks: Option<u64>,
    pub languages: Option<LanguageMap>,
    pub last_updated: Option<OffsetDateTime>,
}

/// Result of the external snapshot lookup. Each field is filled independently,
/// so a failed sub-lookup leaves only its own field empty.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ProfileSnapshot {
    pub public_repos: Option<u64>,
    pub followers: Option<u64>,
    pub following: Option<u64>,
    pub commits: Option<u64>,
    pub pull_requests: Option<u64>,
    pub merged_prs: Option<u64>,
    pub open_prs: Option<u64>,
    pub closed_prs: Option<u64>,
    pub issues: Option<u64>,
    pub recent_prs: Option<Vec<PullRequestSummary>>,
}

impl ProfileSnapshot {
    pub fn is_empty(&self) -> bool { *self == Self::default() }
}

/// A member together with its persisted activity, as read for aggregation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemberActivity {
    pub member: MemberRef,
    pub activity: ActivitySnapshot,
}

/// Collection-wide statistics, stored as a singleton.
///
/// Missing fields decode to zero so that a hand-seeded record holding only
/// `events` is still readable.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    #[serde(default)]
    pub members: u64,
    #[serde(default)]
    pub members_with_external_link: u64,
    #[serde(default)]
    pub projects: u64,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub total_commits: u64,
    #[serde(default)]
    pub total_forks: u64,
    #[serde(default)]
    pub total_pull_requests: u64,
    #[serde(default = "unix_epoch", with = "time::serde::rfc3339")]
    pub calculated_at: OffsetDateTime,
    #[serde(default = "unix_epoch", with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    /// Curated by hand; carried forward on every recompute.
    #[serde(default = "default_events")]
    pub events: u64,
}

fn unix_epoch() -> OffsetDateTime { OffsetDateTime::UNIX_EPOCH }

fn default_events() -> u64 { DEFAULT_EVENTS }
