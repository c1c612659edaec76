//! In-memory collaborators for engine tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, anyhow, bail};
use roster_core::{
    ActivitySource, ActivityStore,
    models::{
        ActivitySnapshot, AggregateSummary, LanguageMap, MemberActivity, MemberRef,
        ProfileSnapshot, RepoSummary,
    },
};

use crate::progress::{JobSummary, ProgressSink, ProgressUpdate};

/// Canned responses for one login.
#[derive(Debug, Clone, Default)]
pub struct FakeProfile {
    pub snapshot: ProfileSnapshot,
    pub repos: Option<Vec<RepoSummary>>,
    pub languages: Option<LanguageMap>,
    /// Time spent inside the snapshot lookup.
    pub delay: Duration,
    pub panics: bool,
}

impl FakeProfile {
    pub fn with_commits(commits: u64) -> Self {
        Self {
            snapshot: ProfileSnapshot { commits: Some(commits), ..Default::default() },
            repos: Some(vec![]),
            languages: Some(LanguageMap::new()),
            ..Default::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
pub struct FakeSource {
    profiles: Mutex<HashMap<String, FakeProfile>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn insert(&self, login: &str, profile: FakeProfile) {
        self.profiles.lock().unwrap().insert(login.to_string(), profile);
    }

    /// Highest number of snapshot lookups observed running at once.
    pub fn max_in_flight(&self) -> usize { self.max_in_flight.load(Ordering::SeqCst) }

    /// Logins in the order their refresh started.
    pub fn started(&self) -> Vec<String> { self.started.lock().unwrap().clone() }

    fn profile(&self, login: &str) -> FakeProfile {
        self.profiles.lock().unwrap().get(login).cloned().unwrap_or_default()
    }
}

impl ActivitySource for FakeSource {
    async fn fetch_snapshot(&self, login: &str) -> ProfileSnapshot {
        let profile = self.profile(login);
        self.started.lock().unwrap().push(login.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !profile.delay.is_zero() {
            tokio::time::sleep(profile.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if profile.panics {
            panic!("snapshot lookup for {login} blew up");
        }
        profile.snapshot
    }

    async fn fetch_repositories(&self, login: &str, limit: usize) -> Option<Vec<RepoSummary>> {
        self.profile(login).repos.map(|repos| repos.into_iter().take(limit).collect())
    }

    async fn fetch_languages(&self, login: &str, _limit: usize) -> Option<LanguageMap> {
        self.profile(login).languages
    }
}

#[derive(Default)]
pub struct MemoryStore {
    members: Mutex<Vec<MemberRef>>,
    activity: Mutex<HashMap<String, ActivitySnapshot>>,
    summaries: Mutex<HashMap<String, AggregateSummary>>,
    fail_list: AtomicBool,
    fail_summary: AtomicBool,
    fail_load: Mutex<HashSet<String>>,
    fail_persist: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn with_members(members: impl IntoIterator<Item = MemberRef>) -> Self {
        let store = Self::default();
        *store.members.lock().unwrap() = members.into_iter().collect();
        store
    }

    pub fn set_activity(&self, id: &str, activity: ActivitySnapshot) {
        self.activity.lock().unwrap().insert(id.to_string(), activity);
    }

    pub fn activity(&self, id: &str) -> Option<ActivitySnapshot> {
        self.activity.lock().unwrap().get(id).cloned()
    }

    pub fn set_summary(&self, key: &str, summary: AggregateSummary) {
        self.summaries.lock().unwrap().insert(key.to_string(), summary);
    }

    pub fn summary(&self, key: &str) -> Option<AggregateSummary> {
        self.summaries.lock().unwrap().get(key).cloned()
    }

    pub fn fail_list(&self) { self.fail_list.store(true, Ordering::SeqCst) }

    pub fn fail_summary(&self) { self.fail_summary.store(true, Ordering::SeqCst) }

    pub fn fail_load(&self, id: &str) { self.fail_load.lock().unwrap().insert(id.to_string()); }

    pub fn fail_persist(&self, id: &str) {
        self.fail_persist.lock().unwrap().insert(id.to_string());
    }
}

impl ActivityStore for MemoryStore {
    async fn list_members(&self) -> Result<Vec<MemberRef>> {
        if self.fail_list.load(Ordering::SeqCst) {
            bail!("member listing unavailable");
        }
        Ok(self.members.lock().unwrap().clone())
    }

    async fn get_activity(&self, id: &str) -> Result<Option<ActivitySnapshot>> {
        if self.fail_load.lock().unwrap().contains(id) {
            bail!("read of {id} failed");
        }
        Ok(self.activity(id))
    }

    async fn merge_activity(&self, id: &str, activity: &ActivitySnapshot) -> Result<()> {
        if self.fail_persist.lock().unwrap().contains(id) {
            bail!("write of {id} failed");
        }
        if !self.members.lock().unwrap().iter().any(|m| m.id == id) {
            return Err(anyhow!("unknown member {id}"));
        }
        self.set_activity(id, activity.clone());
        Ok(())
    }

    async fn list_member_activity(&self) -> Result<Vec<MemberActivity>> {
        if self.fail_summary.load(Ordering::SeqCst) {
            bail!("activity listing unavailable");
        }
        let members = self.members.lock().unwrap().clone();
        Ok(members
            .into_iter()
            .map(|member| {
                let activity = self.activity(&member.id).unwrap_or_default();
                MemberActivity { member, activity }
            })
            .collect())
    }

    async fn get_summary(&self, key: &str) -> Result<Option<AggregateSummary>> {
        Ok(self.summary(key))
    }

    async fn upsert_summary(&self, key: &str, summary: &AggregateSummary) -> Result<()> {
        self.set_summary(key, summary.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<ProgressUpdate>>,
    summaries: Mutex<Vec<JobSummary>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<ProgressUpdate> { self.updates.lock().unwrap().clone() }

    pub fn summaries(&self) -> Vec<JobSummary> { self.summaries.lock().unwrap().clone() }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }

    fn on_job_complete(&self, summary: &JobSummary) {
        self.summaries.lock().unwrap().push(*summary);
    }
}

pub fn member(id: &str) -> MemberRef {
    MemberRef { id: id.to_string(), external_id: format!("gh-{id}"), connected: true }
}
