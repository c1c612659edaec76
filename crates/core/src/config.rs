use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DbConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// Personal access token. Without one, requests are unauthenticated
    /// (60 requests/hour) and language breakdowns are skipped.
    pub token: Option<String>,
    /// Override for GitHub Enterprise installations.
    pub api_url: Option<String>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl GitHubConfig {
    pub fn cache_ttl(&self) -> Duration { Duration::from_secs(self.cache_ttl_secs) }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    /// Maximum number of members refreshed concurrently.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between consecutive batches.
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
    /// Logical deadline for a single member's refresh.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    /// Number of repositories fetched per member.
    #[serde(default = "default_repo_limit")]
    pub repo_limit: usize,
    /// Number of repositories whose language breakdown is fetched per member.
    #[serde(default = "default_language_repo_limit")]
    pub language_repo_limit: usize,
    #[serde(default = "default_summary_key")]
    pub summary_key: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            task_timeout_ms: default_task_timeout_ms(),
            repo_limit: default_repo_limit(),
            language_repo_limit: default_language_repo_limit(),
            summary_key: default_summary_key(),
        }
    }
}

impl RefreshConfig {
    /// Batch size, never zero.
    pub fn batch_size(&self) -> usize { self.batch_size.max(1) }

    pub fn inter_batch_delay(&self) -> Duration { Duration::from_millis(self.inter_batch_delay_ms) }

    pub fn task_timeout(&self) -> Duration { Duration::from_millis(self.task_timeout_ms) }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Cron expression, either the six-field form or English ("every 6 hours").
    #[serde(default = "default_cron")]
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self { Self { cron: default_cron() } }
}

fn default_cache_ttl_secs() -> u64 { 300 }

fn default_cache_capacity() -> u64 { 4096 }

fn default_batch_size() -> usize { 3 }

fn default_inter_batch_delay_ms() -> u64 { 1000 }

fn default_task_timeout_ms() -> u64 { 60_000 }

fn default_repo_limit() -> usize { 100 }

fn default_language_repo_limit() -> usize { 10 }

fn default_summary_key() -> String { "stats".to_string() }

fn default_cron() -> String { "every 6 hours".to_string() }
