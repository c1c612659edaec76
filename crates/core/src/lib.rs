pub mod config;
pub mod models;

use std::future::Future;

use anyhow::Result;

use crate::models::{
    ActivitySnapshot, AggregateSummary, LanguageMap, MemberActivity, MemberRef, ProfileSnapshot,
    RepoSummary,
};

/// Source of externally-hosted activity data.
///
/// Implementations never fail: errors are logged and reported as missing
/// data, so callers can tell "lookup failed" apart from "genuinely zero".
/// No concurrency cap is enforced here; callers bound their own fan-out.
pub trait ActivitySource: Send + Sync + 'static {
    fn fetch_snapshot(&self, login: &str) -> impl Future<Output = ProfileSnapshot> + Send;

    /// Up to `limit` repositories, or `None` if the lookup failed.
    fn fetch_repositories(
        &self,
        login: &str,
        limit: usize,
    ) -> impl Future<Output = Option<Vec<RepoSummary>>> + Send;

    /// Language breakdown summed over up to `limit` repositories, or `None` if
    /// the lookup failed or no credential is configured.
    fn fetch_languages(
        &self,
        login: &str,
        limit: usize,
    ) -> impl Future<Output = Option<LanguageMap>> + Send;
}

/// Persistent storage for member activity and the aggregate summary.
pub trait ActivityStore: Send + Sync + 'static {
    fn list_members(&self) -> impl Future<Output = Result<Vec<MemberRef>>> + Send;

    fn get_activity(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ActivitySnapshot>>> + Send;

    /// Upsert the activity fields of a member, leaving every other field of
    /// the member's record untouched.
    fn merge_activity(
        &self,
        id: &str,
        activity: &ActivitySnapshot,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Every member with its activity; members never refreshed read as zero.
    fn list_member_activity(&self) -> impl Future<Output = Result<Vec<MemberActivity>>> + Send;

    fn get_summary(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<AggregateSummary>>> + Send;

    /// Create the summary if absent, otherwise merge its fields into the
    /// stored record, keeping fields the summary does not carry.
    fn upsert_summary(
        &self,
        key: &str,
        summary: &AggregateSummary,
    ) -> impl Future<Output = Result<()>> + Send;
}
