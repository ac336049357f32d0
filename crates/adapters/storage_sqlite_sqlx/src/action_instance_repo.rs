//! `SQLite` implementation of [`ActionInstanceRepository`].
//!
//! The action definition is stored in its own table and joined back on read.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use areaflow_app::ports::ActionInstanceRepository;
use areaflow_domain::action::{ActionDefinition, ActionInstance};
use areaflow_domain::error::{AreaflowError, NotFoundError};
use areaflow_domain::id::{ActionInstanceId, AreaId};

use crate::codec::{decode_id, decode_opt_id, decode_payload, encode_payload};
use crate::error::StorageError;

struct Wrapper(ActionInstance);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let user_id: String = row.try_get("user_id")?;
        let area_id: String = row.try_get("area_id")?;
        let definition_id: String = row.try_get("definition_id")?;
        let service_account_id: Option<String> = row.try_get("service_account_id")?;
        let params: String = row.try_get("params")?;

        Ok(Self(ActionInstance {
            id: decode_id(&id)?,
            user_id: decode_id(&user_id)?,
            area_id: decode_id(&area_id)?,
            definition: ActionDefinition {
                id: decode_id(&definition_id)?,
                key: row.try_get("definition_key")?,
                executable: row.try_get("definition_executable")?,
            },
            service_account_id: decode_opt_id(service_account_id)?,
            name: row.try_get("name")?,
            enabled: row.try_get("enabled")?,
            params: decode_payload(&params)?,
        }))
    }
}

const UPSERT_DEFINITION: &str = "INSERT INTO action_definitions (id, key, executable) VALUES (?, ?, ?) \
     ON CONFLICT (id) DO UPDATE SET key = excluded.key, executable = excluded.executable";
const INSERT: &str = "INSERT INTO action_instances \
     (id, user_id, area_id, definition_id, service_account_id, name, enabled, params) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)";
const UPDATE: &str = "UPDATE action_instances SET user_id = ?, area_id = ?, definition_id = ?, \
     service_account_id = ?, name = ?, enabled = ?, params = ? WHERE id = ?";
const SELECT_BY_ID: &str = "SELECT ai.*, d.key AS definition_key, d.executable AS definition_executable \
     FROM action_instances ai JOIN action_definitions d ON d.id = ai.definition_id \
     WHERE ai.id = ?";
const SELECT_ENABLED_BY_AREA: &str = "SELECT ai.*, d.key AS definition_key, d.executable AS definition_executable \
     FROM action_instances ai JOIN action_definitions d ON d.id = ai.definition_id \
     WHERE ai.area_id = ? AND ai.enabled = 1 ORDER BY ai.rowid";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Write {
    Insert,
    Update,
}

/// `SQLite`-backed action instance repository.
pub struct SqliteActionInstanceRepository {
    pool: SqlitePool,
}

impl SqliteActionInstanceRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write the definition and the instance row in one transaction.
    async fn save(&self, instance: &ActionInstance, write: Write) -> Result<u64, StorageError> {
        let params = encode_payload(&instance.params)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(UPSERT_DEFINITION)
            .bind(instance.definition.id.to_string())
            .bind(&instance.definition.key)
            .bind(instance.definition.executable)
            .execute(&mut *tx)
            .await?;

        let query = if write == Write::Insert {
            sqlx::query(INSERT)
                .bind(instance.id.to_string())
                .bind(instance.user_id.to_string())
                .bind(instance.area_id.to_string())
                .bind(instance.definition.id.to_string())
                .bind(instance.service_account_id.map(|id| id.to_string()))
                .bind(&instance.name)
                .bind(instance.enabled)
                .bind(params)
        } else {
            sqlx::query(UPDATE)
                .bind(instance.user_id.to_string())
                .bind(instance.area_id.to_string())
                .bind(instance.definition.id.to_string())
                .bind(instance.service_account_id.map(|id| id.to_string()))
                .bind(&instance.name)
                .bind(instance.enabled)
                .bind(params)
                .bind(instance.id.to_string())
        };
        let affected = query.execute(&mut *tx).await?.rows_affected();

        tx.commit().await?;
        Ok(affected)
    }
}

impl ActionInstanceRepository for SqliteActionInstanceRepository {
    async fn create(&self, instance: ActionInstance) -> Result<ActionInstance, AreaflowError> {
        self.save(&instance, Write::Insert).await?;
        Ok(instance)
    }

    async fn get_by_id(
        &self,
        id: ActionInstanceId,
    ) -> Result<Option<ActionInstance>, AreaflowError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn update(&self, instance: ActionInstance) -> Result<ActionInstance, AreaflowError> {
        if self.save(&instance, Write::Update).await? == 0 {
            return Err(NotFoundError::new("ActionInstance", instance.id).into());
        }
        Ok(instance)
    }

    fn find_enabled_by_area(
        &self,
        area_id: AreaId,
    ) -> impl Future<Output = Result<Vec<ActionInstance>, AreaflowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ENABLED_BY_AREA)
                .bind(area_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }
}
