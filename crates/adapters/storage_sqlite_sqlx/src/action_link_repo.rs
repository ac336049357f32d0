//! `SQLite` implementation of [`ActionLinkRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use areaflow_app::ports::ActionLinkRepository;
use areaflow_domain::action_link::{ActionLink, LinkKind};
use areaflow_domain::error::AreaflowError;
use areaflow_domain::id::ActionInstanceId;

use crate::codec::{decode_id, decode_opt_value, decode_payload, decode_ts, encode_payload, encode_ts, encode_value};
use crate::error::StorageError;

struct Wrapper(ActionLink);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let area_id: String = row.try_get("area_id")?;
        let source_id: String = row.try_get("source_id")?;
        let target_id: String = row.try_get("target_id")?;
        let kind: String = row.try_get("kind")?;
        let mapping: String = row.try_get("mapping")?;
        let condition: Option<String> = row.try_get("condition")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(ActionLink {
            id: decode_id(&id)?,
            area_id: decode_id(&area_id)?,
            source_id: decode_id(&source_id)?,
            target_id: decode_id(&target_id)?,
            kind: LinkKind::from_str(&kind).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            mapping: decode_payload(&mapping)?,
            condition: decode_opt_value(condition)?,
            order: row.try_get("link_order")?,
            created_at: decode_ts(&created_at)?,
        }))
    }
}

const INSERT: &str = "INSERT INTO action_links \
     (id, area_id, source_id, target_id, kind, mapping, condition, link_order, created_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";
const SELECT_BY_SOURCE: &str =
    "SELECT * FROM action_links WHERE source_id = ? ORDER BY link_order, created_at, rowid";

/// `SQLite`-backed action link repository.
pub struct SqliteActionLinkRepository {
    pool: SqlitePool,
}

impl SqliteActionLinkRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ActionLinkRepository for SqliteActionLinkRepository {
    async fn create(&self, link: ActionLink) -> Result<ActionLink, AreaflowError> {
        let mapping = encode_payload(&link.mapping)?;
        let condition = link.condition.as_ref().map(encode_value).transpose()?;

        sqlx::query(INSERT)
            .bind(link.id.to_string())
            .bind(link.area_id.to_string())
            .bind(link.source_id.to_string())
            .bind(link.target_id.to_string())
            .bind(link.kind.as_str())
            .bind(mapping)
            .bind(condition)
            .bind(link.order)
            .bind(encode_ts(link.created_at))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(link)
    }

    async fn find_by_source(
        &self,
        source_id: ActionInstanceId,
    ) -> Result<Vec<ActionLink>, AreaflowError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_SOURCE)
            .bind(source_id.to_string())
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
    use areaflow_domain::area::Area;
    use areaflow_domain::id::ActionLinkId;
    use areaflow_domain::payload::from_json;
    use areaflow_domain::time::now;
    use serde_json::json;

    #[tokio::test]
    async fn should_return_links_of_source_by_order() {
        let db = Config::in_memory().build().await.unwrap();
        let area = SqliteAreaRepository::new(db.pool().clone())
            .create(Area::builder().name("links").build().unwrap())
            .await
            .unwrap();
        let instances = SqliteActionInstanceRepository::new(db.pool().clone());
        let mut created = Vec::new();
        for name in ["source", "a", "b"] {
            let instance = ActionInstance::builder()
                .area_id(area.id)
                .name(name)
                .definition(ActionDefinition::new("http.request", true).unwrap())
                .build()
                .unwrap();
            created.push(instances.create(instance).await.unwrap());
        }
        let repo = SqliteActionLinkRepository::new(db.pool().clone());

        let link = |target: &ActionInstance, order: i64| ActionLink {
            id: ActionLinkId::new(),
            area_id: area.id,
            source_id: created[0].id,
            target_id: target.id,
            kind: LinkKind::Conditional,
            mapping: from_json(json!({"title": "issue.title"})),
            condition: Some(json!({"field": "action", "value": "opened"}).into()),
            order,
            created_at: now(),
        };
        let late = repo.create(link(&created[1], 3)).await.unwrap();
        let early = repo.create(link(&created[2], 1)).await.unwrap();

        let links = repo.find_by_source(created[0].id).await.unwrap();
        assert_eq!(links.iter().map(|l| l.id).collect::<Vec<_>>(), vec![early.id, late.id]);
        assert_eq!(links[0].kind, LinkKind::Conditional);
        assert_eq!(links[0].mapping, early.mapping);
        assert_eq!(links[0].condition, early.condition);
        assert!(repo.find_by_source(created[1].id).await.unwrap().is_empty());
    }
}
