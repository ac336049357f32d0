//! `SQLite` implementation of [`ExecutionRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use areaflow_app::ports::{ExecutionRepository, StatusCounts};
use areaflow_domain::error::{AreaflowError, NotFoundError};
use areaflow_domain::execution::{Execution, ExecutionStatus};
use areaflow_domain::id::{ActionInstanceId, CorrelationId, ExecutionId};
use areaflow_domain::time::Timestamp;

use crate::codec::{
    decode_id, decode_opt_id, decode_opt_payload, decode_opt_ts, decode_payload, decode_ts,
    encode_payload, encode_ts,
};
use crate::error::StorageError;

fn decode_status(raw: &str) -> Result<ExecutionStatus, sqlx::Error> {
    ExecutionStatus::from_str(raw).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

struct Wrapper(Execution);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let action_instance_id: String = row.try_get("action_instance_id")?;
        let activation_mode_id: Option<String> = row.try_get("activation_mode_id")?;
        let area_id: Option<String> = row.try_get("area_id")?;
        let status: String = row.try_get("status")?;
        let attempt: i64 = row.try_get("attempt")?;
        let queued_at: String = row.try_get("queued_at")?;
        let input: String = row.try_get("input")?;
        let correlation_id: String = row.try_get("correlation_id")?;

        Ok(Self(Execution {
            id: decode_id(&id)?,
            action_instance_id: decode_id(&action_instance_id)?,
            activation_mode_id: decode_opt_id(activation_mode_id)?,
            area_id: decode_opt_id(area_id)?,
            status: decode_status(&status)?,
            attempt: u32::try_from(attempt).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            queued_at: decode_ts(&queued_at)?,
            started_at: decode_opt_ts(row.try_get("started_at")?)?,
            finished_at: decode_opt_ts(row.try_get("finished_at")?)?,
            input: decode_payload(&input)?,
            output: decode_opt_payload(row.try_get("output")?)?,
            error: decode_opt_payload(row.try_get("error")?)?,
            correlation_id: decode_id(&correlation_id)?,
            dedup_key: row.try_get("dedup_key")?,
        }))
    }
}

/// Encoded columns shared by insert and update.
struct Columns {
    input: String,
    output: Option<String>,
    error: Option<String>,
}

impl Columns {
    fn encode(execution: &Execution) -> Result<Self, StorageError> {
        Ok(Self {
            input: encode_payload(&execution.input)?,
            output: execution.output.as_ref().map(encode_payload).transpose()?,
            error: execution.error.as_ref().map(encode_payload).transpose()?,
        })
    }
}

const INSERT: &str = "INSERT INTO executions \
     (id, action_instance_id, activation_mode_id, area_id, status, attempt, queued_at, started_at, \
      finished_at, input, output, error, correlation_id, dedup_key) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";
const UPDATE: &str = "UPDATE executions SET status = ?, attempt = ?, queued_at = ?, started_at = ?, \
     finished_at = ?, input = ?, output = ?, error = ?, dedup_key = ? WHERE id = ?";
const SELECT_BY_ID: &str = "SELECT * FROM executions WHERE id = ?";
const SELECT_QUEUED: &str =
    "SELECT * FROM executions WHERE status = 'QUEUED' ORDER BY queued_at, rowid";
const SELECT_READY_FOR_RETRY: &str = "SELECT * FROM executions WHERE status = 'RETRY' \
     AND (started_at IS NULL OR started_at < ?) ORDER BY queued_at, rowid";
const SELECT_TIMED_OUT: &str = "SELECT * FROM executions WHERE status = 'RUNNING' \
     AND started_at IS NOT NULL AND started_at < ? ORDER BY started_at, rowid";
const COUNT_FAILED_SINCE: &str = "SELECT COUNT(*) FROM executions \
     WHERE action_instance_id = ? AND status = 'FAILED' AND queued_at > ?";
const COUNT_BY_STATUS: &str = "SELECT status, COUNT(*) AS total FROM executions GROUP BY status";
const SELECT_BY_CORRELATION: &str =
    "SELECT * FROM executions WHERE correlation_id = ? ORDER BY queued_at, rowid";

/// `SQLite`-backed execution repository.
pub struct SqliteExecutionRepository {
    pool: SqlitePool,
}

impl SqliteExecutionRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn select_many(
        &self,
        query: &'static str,
        bind: Option<String>,
    ) -> Result<Vec<Execution>, AreaflowError> {
        let mut query = sqlx::query_as::<_, Wrapper>(query);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

impl ExecutionRepository for SqliteExecutionRepository {
    async fn create(&self, execution: Execution) -> Result<Execution, AreaflowError> {
        let columns = Columns::encode(&execution)?;

        sqlx::query(INSERT)
            .bind(execution.id.to_string())
            .bind(execution.action_instance_id.to_string())
            .bind(execution.activation_mode_id.map(|id| id.to_string()))
            .bind(execution.area_id.map(|id| id.to_string()))
            .bind(execution.status.as_str())
            .bind(i64::from(execution.attempt))
            .bind(encode_ts(execution.queued_at))
            .bind(execution.started_at.map(encode_ts))
            .bind(execution.finished_at.map(encode_ts))
            .bind(columns.input)
            .bind(columns.output)
            .bind(columns.error)
            .bind(execution.correlation_id.to_string())
            .bind(execution.dedup_key.as_deref())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(execution)
    }

    async fn get_by_id(&self, id: ExecutionId) -> Result<Option<Execution>, AreaflowError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn update(&self, execution: Execution) -> Result<Execution, AreaflowError> {
        let columns = Columns::encode(&execution)?;

        let result = sqlx::query(UPDATE)
            .bind(execution.status.as_str())
            .bind(i64::from(execution.attempt))
            .bind(encode_ts(execution.queued_at))
            .bind(execution.started_at.map(encode_ts))
            .bind(execution.finished_at.map(encode_ts))
            .bind(columns.input)
            .bind(columns.output)
            .bind(columns.error)
            .bind(execution.dedup_key.as_deref())
            .bind(execution.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Execution", execution.id).into());
        }

        Ok(execution)
    }

    async fn find_queued(&self) -> Result<Vec<Execution>, AreaflowError> {
        self.select_many(SELECT_QUEUED, None).await
    }

    async fn find_ready_for_retry(
        &self,
        threshold: Timestamp,
    ) -> Result<Vec<Execution>, AreaflowError> {
        self.select_many(SELECT_READY_FOR_RETRY, Some(encode_ts(threshold)))
            .await
    }

    async fn find_timed_out(&self, threshold: Timestamp) -> Result<Vec<Execution>, AreaflowError> {
        self.select_many(SELECT_TIMED_OUT, Some(encode_ts(threshold)))
            .await
    }

    async fn count_failed_since(
        &self,
        action_instance_id: ActionInstanceId,
        since: Timestamp,
    ) -> Result<u64, AreaflowError> {
        let (count,): (i64,) = sqlx::query_as(COUNT_FAILED_SINCE)
            .bind(action_instance_id.to_string())
            .bind(encode_ts(since))
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(count.unsigned_abs())
    }

    async fn count_by_status(&self) -> Result<StatusCounts, AreaflowError> {
        let rows = sqlx::query(COUNT_BY_STATUS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let mut counts = StatusCounts::new();
        for row in rows {
            let status: String = row.try_get("status").map_err(StorageError::from)?;
            let total: i64 = row.try_get("total").map_err(StorageError::from)?;
            let status = decode_status(&status).map_err(StorageError::from)?;
            counts.insert(status, total.unsigned_abs());
        }
        Ok(counts)
    }

    async fn find_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<Execution>, AreaflowError> {
        self.select_many(SELECT_BY_CORRELATION, Some(correlation_id.to_string()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pool::Config;
    use areaflow_app::services::execution_service::{ExecutionService, TimeoutPolicy};
    use areaflow_domain::execution::ExecutionResult;
    use areaflow_domain::payload::{Payload, Value, from_json};
    use areaflow_domain::retry::RetryPolicy;
    use areaflow_domain::time::{ago, now};
    use serde_json::json;

    async fn setup() -> SqliteExecutionRepository {
        let db = Config::in_memory().build().await.unwrap();
        SqliteExecutionRepository::new(db.pool().clone())
    }

    fn queued(instance: ActionInstanceId, correlation: CorrelationId) -> Execution {
        Execution::queued(
            instance,
            None,
            None,
            from_json(json!({"repo": "areaflow", "stars": 42})),
            correlation,
        )
    }

    #[tokio::test]
    async fn should_round_trip_execution_columns() {
        let repo = setup().await;
        let mut execution = queued(ActionInstanceId::new(), CorrelationId::new())
            .with_dedup_key("github:42");
        execution.area_id = Some(areaflow_domain::id::AreaId::new());

        repo.create(execution.clone()).await.unwrap();

        let fetched = repo.get_by_id(execution.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, execution.id);
        assert_eq!(fetched.area_id, execution.area_id);
        assert_eq!(fetched.status, ExecutionStatus::Queued);
        assert_eq!(fetched.input, execution.input);
        assert_eq!(fetched.dedup_key.as_deref(), Some("github:42"));
        assert_eq!(
            fetched.queued_at.timestamp_micros(),
            execution.queued_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn should_return_not_found_when_updating_unknown_execution() {
        let repo = setup().await;
        let result = repo.update(queued(ActionInstanceId::new(), CorrelationId::new())).await;
        assert!(matches!(result, Err(AreaflowError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_drive_lifecycle_through_service() {
        let svc = ExecutionService::new(setup().await);
        let execution = svc
            .insert(queued(ActionInstanceId::new(), CorrelationId::new()))
            .await
            .unwrap();

        svc.mark_started(execution.id).await.unwrap();
        let done = svc
            .record_result(ExecutionResult::success(
                execution.id,
                from_json(json!({"status_code": 201})),
            ))
            .await
            .unwrap();

        let fetched = svc.get(execution.id).await.unwrap();
        assert_eq!(fetched.status, ExecutionStatus::Ok);
        assert!(fetched.started_at.is_some());
        assert!(fetched.finished_at.is_some());
        assert_eq!(fetched.output.unwrap()["status_code"], Value::Int(201));
        assert_eq!(done.attempt, 0);
    }

    #[tokio::test]
    async fn should_answer_queue_retry_and_timeout_queries() {
        let repo = setup().await;
        let instance = ActionInstanceId::new();
        let first = repo.create(queued(instance, CorrelationId::new())).await.unwrap();
        let second = repo.create(queued(instance, CorrelationId::new())).await.unwrap();

        let mut retry = repo.create(queued(instance, CorrelationId::new())).await.unwrap();
        retry.status = ExecutionStatus::Retry;
        retry.attempt = 1;
        repo.update(retry.clone()).await.unwrap();

        let mut running = repo.create(queued(instance, CorrelationId::new())).await.unwrap();
        running.status = ExecutionStatus::Running;
        running.started_at = Some(now() - chrono::Duration::minutes(10));
        repo.update(running.clone()).await.unwrap();

        let queue: Vec<_> = repo.find_queued().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(queue, vec![first.id, second.id]);

        let ready = repo.find_ready_for_retry(now()).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].attempt, 1);

        let stuck = repo
            .find_timed_out(ago(Duration::from_secs(5 * 60)))
            .await
            .unwrap();
        assert_eq!(stuck.iter().map(|e| e.id).collect::<Vec<_>>(), vec![running.id]);
        assert!(
            repo.find_timed_out(ago(Duration::from_secs(60 * 60)))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn should_count_statuses_and_failures() {
        let svc = ExecutionService::new(setup().await);
        let instance = ActionInstanceId::new();
        let since = now() - chrono::Duration::minutes(1);
        for _ in 0..2 {
            let execution = svc.insert(queued(instance, CorrelationId::new())).await.unwrap();
            svc.record_result(ExecutionResult::failure(execution.id, Payload::new(), false))
                .await
                .unwrap();
        }
        svc.insert(queued(ActionInstanceId::new(), CorrelationId::new()))
            .await
            .unwrap();

        assert_eq!(svc.count_failed_since(instance, since).await.unwrap(), 2);
        assert!(svc.has_excessive_failures(instance, 2, since).await.unwrap());

        let stats = svc.statistics().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status[&ExecutionStatus::Failed], 2);
        assert_eq!(stats.by_status[&ExecutionStatus::Queued], 1);
        assert_eq!(stats.by_status[&ExecutionStatus::Running], 0);
    }

    #[tokio::test]
    async fn should_group_by_correlation_and_sweep_timeouts() {
        let svc = ExecutionService::new(setup().await);
        let correlation = CorrelationId::new();
        let instance = ActionInstanceId::new();
        let a = svc.insert(queued(instance, correlation)).await.unwrap();
        svc.insert(queued(instance, correlation)).await.unwrap();
        svc.insert(queued(instance, CorrelationId::new())).await.unwrap();
        assert_eq!(svc.by_correlation(correlation).await.unwrap().len(), 2);

        svc.mark_started(a.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let report = svc
            .sweep_timed_out(Duration::ZERO, TimeoutPolicy::Fail, &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(report.failed, vec![a.id]);
        let failed = svc.get(a.id).await.unwrap();
        assert_eq!(failed.error.unwrap()["reason"], Value::from("timeout"));
    }
}
