pub mod cache;

use std::sync::Arc;

use anyhow::{Context, Result};
use http::StatusCode;
use octocrab::{GitHubError, Octocrab};
use roster_core::{
    ActivitySource,
    config::GitHubConfig,
    models::{
        LanguageMap, ProfileSnapshot, PullRequestState, PullRequestSummary, RECENT_PR_LIMIT,
        RepoSummary,
    },
};
use serde::{Deserialize, de::DeserializeOwned};
use time::OffsetDateTime;

pub use crate::cache::FetchCache;
use crate::cache::cache_key;

/// GitHub REST client used as the member activity source.
#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
    cache: FetchCache,
    authenticated: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct UserProfile {
    public_repos: u64,
    followers: u64,
    following: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "T: Deserialize<'de>")]
struct SearchResults<T> {
    total_count: u64,
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct IssueItem {
    title: String,
    html_url: String,
    repository_url: String,
    state: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    pull_request: Option<PullRequestRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct PullRequestRef {
    merged_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RepoItem {
    name: String,
    owner: RepoOwner,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    private: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RepoOwner {
    login: String,
}

impl From<&RepoItem> for RepoSummary {
    fn from(value: &RepoItem) -> Self {
        Self { stars: value.stargazers_count, forks: value.forks_count, is_private: value.private }
    }
}

impl From<IssueItem> for PullRequestSummary {
    fn from(value: IssueItem) -> Self {
        let merged = value.pull_request.as_ref().is_some_and(|pr| pr.merged_at.is_some());
        let state = if merged {
            PullRequestState::Merged
        } else {
            value.state.parse().unwrap_or(PullRequestState::Open)
        };
        Self {
            title: value.title,
            url: value.html_url,
            repository: repo_name_from_api_url(&value.repository_url)
                .unwrap_or_default()
                .to_string(),
            state,
            created_at: value.created_at,
        }
    }
}

// GitHub caps per_page at 100
const MAX_PAGE_SIZE: usize = 100;

impl GitHub {
    pub async fn new(config: &GitHubConfig, cache: FetchCache) -> Result<Arc<Self>> {
        let mut builder = Octocrab::builder();
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
        }
        if let Some(api_url) = &config.api_url {
            builder = builder.base_uri(api_url.as_str()).context("Invalid GitHub API URL")?;
        }
        let client = builder.build().context("Failed to create GitHub client")?;
        let authenticated = config.token.is_some();
        if authenticated {
            let profile = client.current().user().await.context("Failed to fetch current user")?;
            tracing::info!("Logged in as {}", profile.login);
        } else {
            tracing::warn!("No GitHub token configured, requests are unauthenticated");
        }
        Ok(Arc::new(Self { client, cache, authenticated }))
    }

    /// Drop all cached API responses.
    pub fn clear_cache(&self) { self.cache.clear() }

    async fn get_cached<T: DeserializeOwned>(
        &self,
        route: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let key = cache_key(route, params);
        let value = match self.cache.get(&key).await {
            Some(value) => value,
            None => {
                let result = if params.is_empty() {
                    self.client.get::<serde_json::Value, _, ()>(route, None).await
                } else {
                    self.client.get::<serde_json::Value, _, _>(route, Some(params)).await
                };
                let value = Arc::new(result.with_context(|| format!("Failed to fetch {key}"))?);
                self.cache.insert(key.clone(), value.clone()).await;
                value
            }
        };
        T::deserialize(value.as_ref()).with_context(|| format!("Failed to decode {key}"))
    }

    async fn search_total(&self, route: &str, query: String) -> Result<u64> {
        let results: SearchResults<serde::de::IgnoredAny> =
            self.get_cached(route, &[("q", query), ("per_page", "1".to_string())]).await?;
        Ok(results.total_count)
    }

    async fn search_pull_requests(&self, login: &str) -> Result<SearchResults<IssueItem>> {
        self.get_cached("/search/issues", &[
            ("q", format!("author:{login} type:pr")),
            ("sort", "created".to_string()),
            ("order", "desc".to_string()),
            ("per_page", RECENT_PR_LIMIT.to_string()),
        ])
        .await
    }

    async fn list_repositories(&self, login: &str, limit: usize) -> Result<Vec<RepoItem>> {
        let per_page = limit.clamp(1, MAX_PAGE_SIZE);
        let mut repositories = Vec::new();
        let mut page = 1u32;
        while repositories.len() < limit {
            let items: Vec<RepoItem> = self
                .get_cached(&format!("/users/{login}/repos"), &[
                    ("type", "owner".to_string()),
                    ("sort", "updated".to_string()),
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ])
                .await?;
            let last_page = items.len() < per_page;
            repositories.extend(items);
            if last_page {
                break;
            }
            page += 1;
        }
        repositories.truncate(limit);
        Ok(repositories)
    }
}

/// Log a failed lookup and discard the error.
fn ok_or_log<T>(result: Result<T>, login: &str, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if is_not_found(&e) => {
            tracing::debug!("No {} found for {}", what, login);
            None
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {} for {}: {:?}", what, login, e);
            None
        }
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<octocrab::Error>(),
        Some(octocrab::Error::GitHub { source, .. })
            if matches!(**source, GitHubError { status_code: StatusCode::NOT_FOUND, .. })
    )
}

impl ActivitySource for GitHub {
    async fn fetch_snapshot(&self, login: &str) -> ProfileSnapshot {
        let mut snapshot = ProfileSnapshot::default();
        let profile = self.get_cached::<UserProfile>(&format!("/users/{login}"), &[]).await;
        let Some(profile) = ok_or_log(profile, login, "profile") else {
            // Nothing else will resolve for an unknown user
            return snapshot;
        };
        snapshot.public_repos = Some(profile.public_repos);
        snapshot.followers = Some(profile.followers);
        snapshot.following = Some(profile.following);

        let commits = self.search_total("/search/commits", format!("author:{login}")).await;
        snapshot.commits = ok_or_log(commits, login, "commit count");

        if let Some(results) =
            ok_or_log(self.search_pull_requests(login).await, login, "pull requests")
        {
            snapshot.pull_requests = Some(results.total_count);
            snapshot.recent_prs =
                Some(results.items.into_iter().map(PullRequestSummary::from).collect());
        }

        let merged = self.search_total("/search/issues", pr_query(login, "is:merged")).await;
        snapshot.merged_prs = ok_or_log(merged, login, "merged pull requests");
        let open = self.search_total("/search/issues", pr_query(login, "state:open")).await;
        snapshot.open_prs = ok_or_log(open, login, "open pull requests");
        let closed =
            self.search_total("/search/issues", pr_query(login, "is:closed is:unmerged")).await;
        snapshot.closed_prs = ok_or_log(closed, login, "closed pull requests");
        let issues =
            self.search_total("/search/issues", format!("author:{login} type:issue")).await;
        snapshot.issues = ok_or_log(issues, login, "issues");
        snapshot
    }

    async fn fetch_repositories(&self, login: &str, limit: usize) -> Option<Vec<RepoSummary>> {
        if limit == 0 {
            // Nothing fetched, so stored totals must be kept
            return None;
        }
        let repositories =
            ok_or_log(self.list_repositories(login, limit).await, login, "repositories")?;
        Some(repositories.iter().map(RepoSummary::from).collect())
    }

    async fn fetch_languages(&self, login: &str, limit: usize) -> Option<LanguageMap> {
        if !self.authenticated {
            tracing::debug!("Skipping languages for {} without a GitHub token", login);
            return None;
        }
        if limit == 0 {
            return None;
        }
        let repositories =
            ok_or_log(self.list_repositories(login, limit).await, login, "repositories")?;
        let mut breakdowns = Vec::with_capacity(repositories.len());
        for repo in &repositories {
            let route = format!("/repos/{}/{}/languages", repo.owner.login, repo.name);
            // A partial breakdown would undercount, so one failure discards all
            let breakdown = self.get_cached::<LanguageMap>(&route, &[]).await;
            breakdowns.push(ok_or_log(breakdown, login, "languages")?);
        }
        Some(sum_languages(breakdowns))
    }
}

fn pr_query(login: &str, qualifier: &str) -> String { format!("author:{login} type:pr {qualifier}") }

/// Sum per-repository language byte counts.
fn sum_languages(breakdowns: impl IntoIterator<Item = LanguageMap>) -> LanguageMap {
    let mut total = LanguageMap::new();
    for breakdown in breakdowns {
        for (language, bytes) in breakdown {
            let entry = total.entry(language).or_default();
            *entry = entry.saturating_add(bytes);
        }
    }
    total
}

/// Extract `owner/name` from an API repository URL such as
/// `https://api.github.com/repos/owner/name`.
pub fn repo_name_from_api_url(url: &str) -> Option<&str> {
    let (_, name) = url.split_once("/repos/")?;
    let name = name.trim_end_matches('/');
    let (owner, repo) = name.split_once('/')?;
    (!owner.is_empty() && !repo.is_empty() && !repo.contains('/')).then_some(name)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn test_repo_name_from_api_url() {
        let cases: &[(&str, Option<&str>)] = &[
            ("https://api.github.com/repos/foo/bar", Some("foo/bar")),
            ("https://api.github.com/repos/foo/bar/", Some("foo/bar")),
            ("https://ghe.example.com/api/v3/repos/foo/bar", Some("foo/bar")),
            ("https://api.github.com/repos/foo", None),
            ("https://api.github.com/users/foo", None),
            ("https://api.github.com/repos/foo/bar/issues", None),
        ];
        for &(url, expected) in cases {
            assert_eq!(repo_name_from_api_url(url), expected, "{url}");
        }
    }

    #[test]
    fn test_pull_request_summary() {
        let item: IssueItem = serde_json::from_value(json!({
            "title": "Add feature",
            "html_url": "https://github.com/foo/bar/pull/12",
            "repository_url": "https://api.github.com/repos/foo/bar",
            "state": "closed",
            "created_at": "2026-09-30T08:15:00Z",
            "pull_request": {"merged_at": "2026-10-01T09:00:00Z"}
        }))
        .unwrap();
        let summary = PullRequestSummary::from(item);
        assert_eq!(summary.state, PullRequestState::Merged);
        assert_eq!(summary.repository, "foo/bar");
        assert_eq!(summary.created_at, datetime!(2026-09-30 08:15 UTC));

        let item: IssueItem = serde_json::from_value(json!({
            "title": "Rejected",
            "html_url": "https://github.com/foo/bar/pull/13",
            "repository_url": "https://api.github.com/repos/foo/bar",
            "state": "closed",
            "created_at": "2026-09-30T08:15:00Z",
            "pull_request": {"merged_at": null}
        }))
        .unwrap();
        assert_eq!(PullRequestSummary::from(item).state, PullRequestState::Closed);
    }

    #[test]
    fn test_repo_summary() {
        let item: RepoItem = serde_json::from_value(json!({
            "name": "bar",
            "owner": {"login": "foo"},
            "stargazers_count": 12,
            "forks_count": 3,
            "private": true
        }))
        .unwrap();
        assert_eq!(RepoSummary::from(&item), RepoSummary { stars: 12, forks: 3, is_private: true });
    }

    #[test]
    fn test_negative_counts_rejected() {
        let result = serde_json::from_value::<UserProfile>(json!({
            "public_repos": -1,
            "followers": 0,
            "following": 0
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_sum_languages() {
        let total = sum_languages([
            LanguageMap::from([("Rust".to_string(), 100), ("Shell".to_string(), 5)]),
            LanguageMap::from([("Rust".to_string(), 50)]),
            LanguageMap::new(),
        ]);
        assert_eq!(total, LanguageMap::from([("Rust".to_string(), 150), ("Shell".to_string(), 5)]));
    }

    /// A client whose requests all fail, so only cached routes resolve.
    fn offline(cache: FetchCache) -> GitHub {
        let client = Octocrab::builder().base_uri("http://127.0.0.1:9").unwrap().build().unwrap();
        GitHub { client, cache, authenticated: true }
    }

    fn repos_page(start: usize, count: usize) -> Arc<serde_json::Value> {
        let items = (start..start + count)
            .map(|i| {
                json!({
                    "name": format!("repo{i}"),
                    "owner": {"login": "octocat"},
                    "stargazers_count": 1,
                    "forks_count": 0,
                    "private": i % 2 == 0
                })
            })
            .collect::<Vec<_>>();
        Arc::new(serde_json::Value::Array(items))
    }

    fn repos_key(per_page: usize, page: u32) -> String {
        cache_key("/users/octocat/repos", &[
            ("type", "owner".to_string()),
            ("sort", "updated".to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ])
    }

    #[tokio::test]
    async fn test_repositories_paginate() {
        let cache = FetchCache::new(16, std::time::Duration::from_secs(60));
        cache.insert(repos_key(100, 1), repos_page(0, 100)).await;
        cache.insert(repos_key(100, 2), repos_page(100, 60)).await;
        let github = offline(cache);

        let repos = github.fetch_repositories("octocat", 150).await.unwrap();
        assert_eq!(repos.len(), 150);
        assert_eq!(repos.iter().filter(|r| r.is_private).count(), 75);

        // A short first page ends the listing without touching page 2
        let cache = FetchCache::new(16, std::time::Duration::from_secs(60));
        cache.insert(repos_key(10, 1), repos_page(0, 4)).await;
        let repos = offline(cache).fetch_repositories("octocat", 10).await.unwrap();
        assert_eq!(repos.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_page_discards_repositories() {
        let cache = FetchCache::new(16, std::time::Duration::from_secs(60));
        cache.insert(repos_key(100, 1), repos_page(0, 100)).await;
        let github = offline(cache);
        assert_eq!(github.fetch_repositories("octocat", 150).await, None);
        assert_eq!(github.fetch_languages("octocat", 150).await, None);
    }

    #[tokio::test]
    async fn test_zero_limit_fetches_nothing() {
        let github = offline(FetchCache::new(16, std::time::Duration::from_secs(60)));
        assert_eq!(github.fetch_repositories("octocat", 0).await, None);
        assert_eq!(github.fetch_languages("octocat", 0).await, None);
    }

    #[tokio::test]
    async fn test_failed_profile_gives_empty_snapshot() {
        let cache = FetchCache::new(16, std::time::Duration::from_secs(60));
        // Search results alone are not used without a profile
        cache
            .insert(
                cache_key("/search/commits", &[
                    ("q", "author:octocat".to_string()),
                    ("per_page", "1".to_string()),
                ]),
                Arc::new(json!({"total_count": 12})),
            )
            .await;
        let github = offline(cache);
        let snapshot = github.fetch_snapshot("octocat").await;
        assert_eq!(snapshot, ProfileSnapshot::default());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_is_not_found() {
        assert!(!is_not_found(&anyhow::anyhow!("connection refused")));
    }

    #[tokio::test]
    async fn test_cached_responses_served_without_network() {
        let cache = FetchCache::new(16, std::time::Duration::from_secs(60));
        cache
            .insert(
                "/users/octocat".to_string(),
                Arc::new(json!({"public_repos": 8, "followers": 20, "following": 1})),
            )
            .await;
        // Unroutable base URI: any request that reaches the network fails
        let client = Octocrab::builder().base_uri("http://127.0.0.1:9").unwrap().build().unwrap();
        let github = GitHub { client, cache, authenticated: false };
        let profile: UserProfile = github.get_cached("/users/octocat", &[]).await.unwrap();
        assert_eq!(profile.followers, 20);

        github.clear_cache();
        assert!(github.get_cached::<UserProfile>("/users/octocat", &[]).await.is_err());
        assert_eq!(github.fetch_languages("octocat", 10).await, None);
    }
}
