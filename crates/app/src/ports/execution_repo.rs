//! Execution repository port: persistence and queries for executions.

use std::collections::BTreeMap;
use std::future::Future;

use areaflow_domain::error::AreaflowError;
use areaflow_domain::execution::{Execution, ExecutionStatus};
use areaflow_domain::id::{ActionInstanceId, CorrelationId, ExecutionId};
use areaflow_domain::time::Timestamp;

/// Number of executions per status. Statuses with no execution may be absent.
pub type StatusCounts = BTreeMap<ExecutionStatus, u64>;

/// Repository for persisting and querying [`Execution`]s.
///
/// Executions are never deleted.
pub trait ExecutionRepository {
    /// Persist a new execution.
    fn create(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, AreaflowError>> + Send;

    fn get_by_id(
        &self,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<Execution>, AreaflowError>> + Send;

    /// Overwrite a stored execution.
    fn update(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, AreaflowError>> + Send;

    /// `QUEUED` executions, oldest `queued_at` first.
    fn find_queued(&self) -> impl Future<Output = Result<Vec<Execution>, AreaflowError>> + Send;

    /// `RETRY` executions never started or started before `threshold`,
    /// oldest `queued_at` first.
    fn find_ready_for_retry(
        &self,
        threshold: Timestamp,
    ) -> impl Future<Output = Result<Vec<Execution>, AreaflowError>> + Send;

    /// `RUNNING` executions started before `threshold`.
    fn find_timed_out(
        &self,
        threshold: Timestamp,
    ) -> impl Future<Output = Result<Vec<Execution>, AreaflowError>> + Send;

    /// Number of `FAILED` executions of `action_instance_id` queued after `since`.
    fn count_failed_since(
        &self,
        action_instance_id: ActionInstanceId,
        since: Timestamp,
    ) -> impl Future<Output = Result<u64, AreaflowError>> + Send;

    fn count_by_status(&self) -> impl Future<Output = Result<StatusCounts, AreaflowError>> + Send;

    /// Every execution sharing `correlation_id`, oldest first.
    fn find_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> impl Future<Output = Result<Vec<Execution>, AreaflowError>> + Send;
}

impl<T: ExecutionRepository + Send + Sync> ExecutionRepository for std::sync::Arc<T> {
    fn create(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, AreaflowError>> + Send {
        (**self).create(execution)
    }

    fn get_by_id(
        &self,
        id: ExecutionId,
    ) -> impl Future<Output = Result<Option<Execution>, AreaflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn update(
        &self,
        execution: Execution,
    ) -> impl Future<Output = Result<Execution, AreaflowError>> + Send {
        (**self).update(execution)
    }

    fn find_queued(&self) -> impl Future<Output = Result<Vec<Execution>, AreaflowError>> + Send {
        (**self).find_queued()
    }

    fn find_ready_for_retry(
        &self,
        threshold: Timestamp,
    ) -> impl Future<Output = Result<Vec<Execution>, AreaflowError>> + Send {
        (**self).find_ready_for_retry(threshold)
    }

    fn find_timed_out(
        &self,
        threshold: Timestamp,
    ) -> impl Future<Output = Result<Vec<Execution>, AreaflowError>> + Send {
        (**self).find_timed_out(threshold)
    }

    fn count_failed_since(
        &self,
        action_instance_id: ActionInstanceId,
        since: Timestamp,
    ) -> impl Future<Output = Result<u64, AreaflowError>> + Send {
        (**self).count_failed_since(action_instance_id, since)
    }

    fn count_by_status(&self) -> impl Future<Output = Result<StatusCounts, AreaflowError>> + Send {
        (**self).count_by_status()
    }

    fn find_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> impl Future<Output = Result<Vec<Execution>, AreaflowError>> + Send {
        (**self).find_by_correlation(correlation_id)
    }
}
