//! `SQLite` implementation of [`DedupStore`].
//!
//! Expiry instants are stored as unix milliseconds; rows whose instant has
//! passed are treated as absent and overwritten on the next claim.

use std::time::Duration;

use sqlx::SqlitePool;

use areaflow_app::ports::DedupStore;
use areaflow_domain::error::AreaflowError;

use crate::error::StorageError;

// A single statement: SQLite applies the upsert atomically, so two callers
// racing on the same key cannot both see `rows_affected == 1`.
const CLAIM: &str = "INSERT INTO dedup_keys (key, expires_at) VALUES (?1, ?2) \
     ON CONFLICT (key) DO UPDATE SET expires_at = excluded.expires_at \
     WHERE dedup_keys.expires_at <= ?3";
const SELECT_LIVE: &str = "SELECT expires_at FROM dedup_keys WHERE key = ? AND expires_at > ?";
const DELETE_LIVE: &str = "DELETE FROM dedup_keys WHERE key = ? AND expires_at > ?";
const DELETE_PREFIX: &str = "DELETE FROM dedup_keys WHERE substr(key, 1, length(?1)) = ?1";
const DELETE_EXPIRED: &str = "DELETE FROM dedup_keys WHERE expires_at <= ?";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// `SQLite`-backed dedup store, shared by every process using the database.
pub struct SqliteDedupStore {
    pool: SqlitePool,
}

impl SqliteDedupStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete expired rows; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the statement fails.
    pub async fn purge_expired(&self) -> Result<u64, StorageError> {
        let result = sqlx::query(DELETE_EXPIRED)
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn live_expiry(&self, key: &str) -> Result<Option<i64>, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as(SELECT_LIVE)
            .bind(key)
            .bind(now_millis())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(expires_at,)| expires_at))
    }
}

impl DedupStore for SqliteDedupStore {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, AreaflowError> {
        let now = now_millis();
        let result = sqlx::query(CLAIM)
            .bind(key)
            .bind(now.saturating_add(millis(ttl)))
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn exists(&self, key: &str) -> Result<bool, AreaflowError> {
        Ok(self.live_expiry(key).await?.is_some())
    }

    async fn remove(&self, key: &str) -> Result<bool, AreaflowError> {
        let result = sqlx::query(DELETE_LIVE)
            .bind(key)
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, AreaflowError> {
        let remaining = self.live_expiry(key).await?.map(|expires_at| {
            let left = expires_at.saturating_sub(now_millis()).max(0);
            Duration::from_millis(left.unsigned_abs())
        });
        Ok(remaining)
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<u64, AreaflowError> {
        let result = sqlx::query(DELETE_PREFIX)
            .bind(prefix)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use areaflow_app::services::dedup_guard::DedupGuard;

    const MINUTE: Duration = Duration::from_secs(60);

    async fn setup() -> SqliteDedupStore {
        let db = Config::in_memory().build().await.unwrap();
        SqliteDedupStore::new(db.pool().clone())
    }

    #[tokio::test]
    async fn should_claim_key_only_once_while_live() {
        let store = setup().await;
        assert!(store.set_if_absent("github:1", MINUTE).await.unwrap());
        assert!(!store.set_if_absent("github:1", MINUTE).await.unwrap());
        assert!(store.exists("github:1").await.unwrap());
        assert!(!store.exists("github:2").await.unwrap());
    }

    #[tokio::test]
    async fn should_reclaim_expired_key() {
        let store = setup().await;
        assert!(store.set_if_absent("slack:1", Duration::ZERO).await.unwrap());
        assert!(!store.exists("slack:1").await.unwrap());
        assert!(store.set_if_absent("slack:1", MINUTE).await.unwrap());
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_report_ttl_and_remove_keys() {
        let store = setup().await;
        store.set_if_absent("github:a", MINUTE).await.unwrap();
        store.set_if_absent("github:b", MINUTE).await.unwrap();
        store.set_if_absent("gitlab:a", MINUTE).await.unwrap();

        let ttl = store.ttl("github:a").await.unwrap().unwrap();
        assert!(ttl <= MINUTE && ttl > Duration::from_secs(50));
        assert_eq!(store.ttl("nope").await.unwrap(), None);

        assert!(store.remove("gitlab:a").await.unwrap());
        assert!(!store.remove("gitlab:a").await.unwrap());
        assert_eq!(store.remove_prefix("github:").await.unwrap(), 2);
        assert!(!store.exists("github:b").await.unwrap());
    }

    #[tokio::test]
    async fn should_not_treat_like_wildcards_as_prefix_patterns() {
        let store = setup().await;
        store.set_if_absent("a_b:1", MINUTE).await.unwrap();
        store.set_if_absent("axb:1", MINUTE).await.unwrap();
        assert_eq!(store.remove_prefix("a_b:").await.unwrap(), 1);
        assert!(store.exists("axb:1").await.unwrap());
    }

    #[tokio::test]
    async fn should_back_dedup_guard() {
        let guard = DedupGuard::new(setup().await);
        assert!(!guard.check_and_mark("delivery-9", "GitHub", None).await);
        assert!(guard.check_and_mark("delivery-9", "github", None).await);
        assert_eq!(guard.clear_provider("github").await.unwrap(), 1);
        assert!(!guard.check_and_mark("delivery-9", "github", None).await);
    }
}
