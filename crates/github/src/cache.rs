use std::{sync::Arc, time::Duration};

use moka::future::Cache;
use roster_core::config::GitHubConfig;
use serde_json::Value;

/// Response cache for GitHub API requests, keyed by route and query.
///
/// Owned by the caller and handed to [`crate::GitHub`], so independent
/// clients (and tests) never share entries unless they share the cache.
#[derive(Clone)]
pub struct FetchCache {
    responses: Cache<String, Arc<Value>>,
}

impl FetchCache {
    pub fn new(max_capacity: u64, time_to_live: Duration) -> Self {
        let responses = Cache::<String, Arc<Value>>::builder()
            .max_capacity(max_capacity)
            .time_to_live(time_to_live)
            .eviction_listener(|k, _v, cause| {
                tracing::trace!("Evicting response from cache: {} ({:?})", k, cause);
            })
            .build();
        Self { responses }
    }

    pub fn from_config(config: &GitHubConfig) -> Self {
        Self::new(config.cache_capacity, config.cache_ttl())
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Value>> { self.responses.get(key).await }

    pub async fn insert(&self, key: String, value: Arc<Value>) {
        self.responses.insert(key, value).await
    }

    /// Drop every cached response.
    pub fn clear(&self) { self.responses.invalidate_all() }
}

/// Cache key for a route and its query parameters.
pub(crate) fn cache_key(route: &str, params: &[(&str, String)]) -> String {
    let mut key = route.to_string();
    for (i, (name, value)) in params.iter().enumerate() {
        key.push(if i == 0 { '?' } else { '&' });
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}
