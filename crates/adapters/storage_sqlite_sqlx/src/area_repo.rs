//! `SQLite` implementation of [`AreaRepository`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use areaflow_app::ports::AreaRepository;
use areaflow_domain::area::Area;
use areaflow_domain::error::{AreaflowError, NotFoundError};
use areaflow_domain::id::AreaId;

use crate::codec::decode_id;
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Area`].
struct Wrapper(Area);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Area> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let user_id: String = row.try_get("user_id")?;

        Ok(Self(Area {
            id: decode_id(&id)?,
            user_id: decode_id(&user_id)?,
            name: row.try_get("name")?,
            enabled: row.try_get("enabled")?,
        }))
    }
}

const INSERT: &str = "INSERT INTO areas (id, user_id, name, enabled) VALUES (?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM areas WHERE id = ?";
const UPDATE: &str = "UPDATE areas SET user_id = ?, name = ?, enabled = ? WHERE id = ?";

/// `SQLite`-backed area repository.
pub struct SqliteAreaRepository {
    pool: SqlitePool,
}

impl SqliteAreaRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AreaRepository for SqliteAreaRepository {
    fn create(&self, area: Area) -> impl Future<Output = Result<Area, AreaflowError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(area.id.to_string())
                .bind(area.user_id.to_string())
                .bind(&area.name)
                .bind(area.enabled)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(area)
        }
    }

    fn get_by_id(
        &self,
        id: AreaId,
    ) -> impl Future<Output = Result<Option<Area>, AreaflowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn update(&self, area: Area) -> impl Future<Output = Result<Area, AreaflowError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(UPDATE)
                .bind(area.user_id.to_string())
                .bind(&area.name)
                .bind(area.enabled)
                .bind(area.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            if result.rows_affected() == 0 {
                return Err(NotFoundError::new("Area", area.id).into());
            }

            Ok(area)
        }
    }
}
