//! `SQLite` implementation of [`ActivationModeRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use areaflow_app::ports::ActivationModeRepository;
use areaflow_domain::activation::{ActivationKind, ActivationMode, DedupStrategy};
use areaflow_domain::error::{AreaflowError, NotFoundError};
use areaflow_domain::id::{ActionInstanceId, ActivationModeId};

use crate::codec::{decode_id, decode_opt_payload, decode_payload, decode_ts, encode_payload, encode_ts};
use crate::error::StorageError;

struct Wrapper(ActivationMode);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let action_instance_id: String = row.try_get("action_instance_id")?;
        let kind: String = row.try_get("kind")?;
        let config: String = row.try_get("config")?;
        let dedup: String = row.try_get("dedup_strategy")?;
        let max_concurrency: Option<i64> = row.try_get("max_concurrency")?;
        let rate_limit: Option<String> = row.try_get("rate_limit")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        let max_concurrency = max_concurrency
            .map(u32::try_from)
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(ActivationMode {
            id: decode_id(&id)?,
            action_instance_id: decode_id(&action_instance_id)?,
            kind: ActivationKind::from_str(&kind).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            config: decode_payload(&config)?,
            enabled: row.try_get("enabled")?,
            dedup: DedupStrategy::from_str(&dedup).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            max_concurrency,
            rate_limit: decode_opt_payload(rate_limit)?,
            created_at: decode_ts(&created_at)?,
            updated_at: decode_ts(&updated_at)?,
        }))
    }
}

const INSERT: &str = "INSERT INTO activation_modes \
     (id, action_instance_id, kind, config, enabled, dedup_strategy, max_concurrency, rate_limit, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";
const UPDATE: &str = "UPDATE activation_modes SET action_instance_id = ?, kind = ?, config = ?, enabled = ?, \
     dedup_strategy = ?, max_concurrency = ?, rate_limit = ?, updated_at = ? WHERE id = ?";
const SELECT_BY_ID: &str = "SELECT * FROM activation_modes WHERE id = ?";
const SELECT_BY_INSTANCE: &str =
    "SELECT * FROM activation_modes WHERE action_instance_id = ? ORDER BY created_at, rowid";

/// `SQLite`-backed activation mode repository.
pub struct SqliteActivationModeRepository {
    pool: SqlitePool,
}

impl SqliteActivationModeRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ActivationModeRepository for SqliteActivationModeRepository {
    async fn create(&self, mode: ActivationMode) -> Result<ActivationMode, AreaflowError> {
        let config = encode_payload(&mode.config)?;
        let rate_limit = mode.rate_limit.as_ref().map(encode_payload).transpose()?;

        sqlx::query(INSERT)
            .bind(mode.id.to_string())
            .bind(mode.action_instance_id.to_string())
            .bind(mode.kind.as_str())
            .bind(config)
            .bind(mode.enabled)
            .bind(mode.dedup.as_str())
            .bind(mode.max_concurrency.map(i64::from))
            .bind(rate_limit)
            .bind(encode_ts(mode.created_at))
            .bind(encode_ts(mode.updated_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(mode)
    }

    async fn get_by_id(
        &self,
        id: ActivationModeId,
    ) -> Result<Option<ActivationMode>, AreaflowError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn update(&self, mode: ActivationMode) -> Result<ActivationMode, AreaflowError> {
        let config = encode_payload(&mode.config)?;
        let rate_limit = mode.rate_limit.as_ref().map(encode_payload).transpose()?;

        let result = sqlx::query(UPDATE)
            .bind(mode.action_instance_id.to_string())
            .bind(mode.kind.as_str())
            .bind(config)
            .bind(mode.enabled)
            .bind(mode.dedup.as_str())
            .bind(mode.max_concurrency.map(i64::from))
            .bind(rate_limit)
            .bind(encode_ts(mode.updated_at))
            .bind(mode.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("ActivationMode", mode.id).into());
        }

        Ok(mode)
    }

    async fn find_enabled_by_kinds(
        &self,
        kinds: &[ActivationKind],
    ) -> Result<Vec<ActivationMode>, AreaflowError> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT * FROM activation_modes WHERE enabled = 1 AND kind IN (");
        let mut separated = query.separated(", ");
        for kind in kinds {
            separated.push_bind(kind.as_str());
        }
        query.push(") ORDER BY created_at, rowid");

        let rows: Vec<Wrapper> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_by_action_instance(
        &self,
        action_instance_id: ActionInstanceId,
    ) -> Result<Vec<ActivationMode>, AreaflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_INSTANCE)
            .bind(action_instance_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_instance_repo::SqliteActionInstanceRepository;
    use crate::area_repo::SqliteAreaRepository;
    use crate::pool::Config;
    use areaflow_app::ports::{ActionInstanceRepository, AreaRepository};
    use areaflow_domain::action::{ActionDefinition, ActionInstance};
    use areaflow_domain::activation::{INTERVAL_SECONDS_KEY, SCHEDULE_EXPRESSION_KEY};
    use areaflow_domain::area::Area;
    use areaflow_domain::payload::Value;

    async fn setup() -> (SqliteActivationModeRepository, ActionInstance) {
        let db = Config::in_memory().build().await.unwrap();
        let area = SqliteAreaRepository::new(db.pool().clone())
            .create(Area::builder().name("scheduled").build().unwrap())
            .await
            .unwrap();
        let instance = SqliteActionInstanceRepository::new(db.pool().clone())
            .create(
                ActionInstance::builder()
                    .area_id(area.id)
                    .name("nightly")
                    .definition(ActionDefinition::new("timer.tick", false).unwrap())
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        (SqliteActivationModeRepository::new(db.pool().clone()), instance)
    }

    fn mode(instance: &ActionInstance, kind: ActivationKind) -> ActivationMode {
        let builder = ActivationMode::builder()
            .action_instance_id(instance.id)
            .kind(kind);
        let builder = match kind {
            ActivationKind::TimeSchedule => builder.config_entry(SCHEDULE_EXPRESSION_KEY, "0 0 3 * * *"),
            ActivationKind::Poll => builder.config_entry(INTERVAL_SECONDS_KEY, 120),
            _ => builder,
        };
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn should_store_and_read_back_activation() {
        let (repo, instance) = setup().await;
        let mut created = mode(&instance, ActivationKind::TimeSchedule);
        created.dedup = DedupStrategy::ByPayloadHash;
        created.max_concurrency = Some(3);
        repo.create(created.clone()).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.kind, ActivationKind::TimeSchedule);
        assert_eq!(fetched.dedup, DedupStrategy::ByPayloadHash);
        assert_eq!(fetched.max_concurrency, Some(3));
        assert_eq!(
            fetched.config[SCHEDULE_EXPRESSION_KEY],
            Value::from("0 0 3 * * *")
        );
        assert!(fetched.schedule().is_ok());
    }

    #[tokio::test]
    async fn should_filter_enabled_time_driven_activations() {
        let (repo, instance) = setup().await;
        let cron = repo.create(mode(&instance, ActivationKind::TimeSchedule)).await.unwrap();
        let poll = repo.create(mode(&instance, ActivationKind::Poll)).await.unwrap();
        repo.create(mode(&instance, ActivationKind::Webhook)).await.unwrap();
        let mut disabled = mode(&instance, ActivationKind::Poll);
        disabled.enabled = false;
        repo.create(disabled).await.unwrap();

        let ids: Vec<_> = repo
            .find_enabled_by_kinds(&ActivationKind::TIME_DRIVEN)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![cron.id, poll.id]);
        assert!(repo.find_enabled_by_kinds(&[]).await.unwrap().is_empty());
        assert_eq!(repo.find_by_action_instance(instance.id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn should_update_enabled_flag() {
        let (repo, instance) = setup().await;
        let mut webhook = repo.create(mode(&instance, ActivationKind::Webhook)).await.unwrap();
        webhook.enabled = false;
        repo.update(webhook.clone()).await.unwrap();

        let fetched = repo.get_by_id(webhook.id).await.unwrap().unwrap();
        assert!(!fetched.enabled);

        let unknown = mode(&instance, ActivationKind::Manual);
        assert!(matches!(
            repo.update(unknown).await,
            Err(AreaflowError::NotFound(_))
        ));
    }
}
