//! Dedup store port: a shared key-value store with per-key expiry.

use std::future::Future;
use std::time::Duration;

use areaflow_domain::error::AreaflowError;

/// Key-value store used by the deduplication guard.
///
/// Implementations must make [`set_if_absent`](Self::set_if_absent) atomic
/// with respect to concurrent callers using the same key. Expired keys are
/// treated as absent.
pub trait DedupStore {
    /// Store `key` for `ttl` unless a live entry already exists.
    ///
    /// Returns `true` when the key was newly stored.
    fn set_if_absent(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, AreaflowError>> + Send;

    /// Whether a live entry exists for `key`.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, AreaflowError>> + Send;

    /// Drop `key`; returns whether a live entry was removed.
    fn remove(&self, key: &str) -> impl Future<Output = Result<bool, AreaflowError>> + Send;

    /// Time left before `key` expires, `None` when absent.
    fn ttl(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Duration>, AreaflowError>> + Send;

    /// Drop every key starting with `prefix`; returns how many were removed.
    fn remove_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<u64, AreaflowError>> + Send;
}

impl<T: DedupStore + Send + Sync> DedupStore for std::sync::Arc<T> {
    fn set_if_absent(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, AreaflowError>> + Send {
        (**self).set_if_absent(key, ttl)
    }

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, AreaflowError>> + Send {
        (**self).exists(key)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<bool, AreaflowError>> + Send {
        (**self).remove(key)
    }

    fn ttl(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Duration>, AreaflowError>> + Send {
        (**self).ttl(key)
    }

    fn remove_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<u64, AreaflowError>> + Send {
        (**self).remove_prefix(prefix)
    }
}
