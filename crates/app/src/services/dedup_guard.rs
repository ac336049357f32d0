//! Deduplication guard for inbound provider events.
//!
//! Keys are `{provider}:{event_id}` with the provider lowercased. The guard
//! fails open: when the store is unreachable every event is treated as new.

use std::collections::HashMap;
use std::time::Duration;

use areaflow_domain::error::AreaflowError;

use crate::ports::DedupStore;

const GITHUB_TTL: Duration = Duration::from_secs(30 * 60);
const SLACK_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Build the dedup key of an event.
#[must_use]
pub fn dedup_key(provider: &str, event_id: &str) -> String {
    format!("{}:{event_id}", provider.to_lowercase())
}

/// Suppresses duplicate deliveries of the same provider event.
pub struct DedupGuard<S> {
    store: S,
    default_ttl: Duration,
    provider_ttls: HashMap<String, Duration>,
}

impl<S: DedupStore> DedupGuard<S> {
    /// Guard with the stock TTLs: github 30 min, slack 5 min, others 15 min.
    pub fn new(store: S) -> Self {
        let provider_ttls = HashMap::from([
            ("github".to_string(), GITHUB_TTL),
            ("slack".to_string(), SLACK_TTL),
        ]);
        Self {
            store,
            default_ttl: DEFAULT_TTL,
            provider_ttls,
        }
    }

    /// Override the TTL used for one provider.
    #[must_use]
    pub fn with_provider_ttl(mut self, provider: &str, ttl: Duration) -> Self {
        self.provider_ttls.insert(provider.to_lowercase(), ttl);
        self
    }

    /// TTL applied to providers without a specific entry.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    #[must_use]
    pub fn ttl_for(&self, provider: &str) -> Duration {
        self.provider_ttls
            .get(&provider.to_lowercase())
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Record the event and report whether it had already been seen.
    ///
    /// A blank event id cannot be tracked and counts as a duplicate.
    #[tracing::instrument(skip(self, ttl))]
    pub async fn check_and_mark(
        &self,
        event_id: &str,
        provider: &str,
        ttl: Option<Duration>,
    ) -> bool {
        if event_id.trim().is_empty() {
            tracing::warn!("event without id rejected as duplicate");
            return true;
        }
        let key = dedup_key(provider, event_id);
        let ttl = ttl.unwrap_or_else(|| self.ttl_for(provider));
        match self.store.set_if_absent(&key, ttl).await {
            Ok(true) => false,
            Ok(false) => {
                tracing::info!(%key, "duplicate event suppressed");
                true
            }
            Err(err) => {
                tracing::warn!(%key, %err, "dedup store unavailable, accepting event");
                false
            }
        }
    }

    /// Read-only check; fails open like [`check_and_mark`](Self::check_and_mark).
    pub async fn is_duplicate(&self, event_id: &str, provider: &str) -> bool {
        if event_id.trim().is_empty() {
            return true;
        }
        let key = dedup_key(provider, event_id);
        match self.store.exists(&key).await {
            Ok(exists) => exists,
            Err(err) => {
                tracing::warn!(%key, %err, "dedup store unavailable");
                false
            }
        }
    }

    /// Forget an event so that it is accepted again.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn remove(&self, event_id: &str, provider: &str) -> Result<bool, AreaflowError> {
        self.store.remove(&dedup_key(provider, event_id)).await
    }

    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn remaining_ttl(
        &self,
        event_id: &str,
        provider: &str,
    ) -> Result<Option<Duration>, AreaflowError> {
        self.store.ttl(&dedup_key(provider, event_id)).await
    }

    /// Forget every event of a provider.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged.
    pub async fn clear_provider(&self, provider: &str) -> Result<u64, AreaflowError> {
        let prefix = format!("{}:", provider.to_lowercase());
        let removed = self.store.remove_prefix(&prefix).await?;
        tracing::info!(provider, removed, "dedup keys cleared");
        Ok(removed)
    }
}
