//! In-process [`DedupStore`] for single-node deployments and tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use areaflow_domain::error::AreaflowError;

use crate::ports::DedupStore;

/// Stand-in expiry for TTLs too large to add to the clock (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Keys with an expiry instant, guarded by a single mutex so that
/// check-and-set is atomic.
///
/// Uses [`tokio::time::Instant`], so expiry follows a paused test clock.
#[derive(Default)]
pub struct InMemoryDedupStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl InMemoryDedupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired key; returns how many were evicted.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        before - entries.len()
    }

    fn live_expiry(&self, key: &str) -> Option<Instant> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).copied().filter(|expires_at| *expires_at > now)
    }
}

impl DedupStore for InMemoryDedupStore {
    fn set_if_absent(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, AreaflowError>> + Send {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let inserted = match entries.get(key) {
            Some(expires_at) if *expires_at > now => false,
            _ => {
                entries.insert(key.to_string(), expiry(now, ttl));
                true
            }
        };
        async move { Ok(inserted) }
    }

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, AreaflowError>> + Send {
        let exists = self.live_expiry(key).is_some();
        async move { Ok(exists) }
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<bool, AreaflowError>> + Send {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = entries
            .remove(key)
            .is_some_and(|expires_at| expires_at > now);
        async move { Ok(removed) }
    }

    fn ttl(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Duration>, AreaflowError>> + Send {
        let remaining = self
            .live_expiry(key)
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()));
        async move { Ok(remaining) }
    }

    fn remove_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<u64, AreaflowError>> + Send {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = (before - entries.len()) as u64;
        async move { Ok(removed) }
    }
}
