//! Execution lifecycle store: creates executions, applies state transitions
//! and answers the queue, retry and timeout queries.

use std::time::Duration;

use serde_json::json;

use areaflow_domain::action::ActionInstance;
use areaflow_domain::error::{AreaflowError, NotFoundError, ValidationError};
use areaflow_domain::execution::{Execution, ExecutionResult, ExecutionStatus};
use areaflow_domain::id::{ActionInstanceId, ActivationModeId, CorrelationId, ExecutionId};
use areaflow_domain::payload::{self, Payload};
use areaflow_domain::retry::RetryPolicy;
use areaflow_domain::time::{self, Timestamp};

use crate::ports::{ExecutionRepository, StatusCounts};

/// What to do with executions stuck in `RUNNING` past the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Record `RETRY` while the retry policy allows it, `FAILED` afterwards.
    #[default]
    Retry,
    /// Record `FAILED` straight away.
    Fail,
}

/// Per-status counters returned by [`ExecutionService::statistics`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExecutionStatistics {
    pub total: u64,
    /// Every status is present, zero when unused.
    pub by_status: StatusCounts,
}

/// Outcome of a timeout sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub retried: Vec<ExecutionId>,
    pub failed: Vec<ExecutionId>,
}

/// Application service owning the execution state machine.
pub struct ExecutionService<R> {
    repo: R,
}

impl<R: ExecutionRepository> ExecutionService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create a `QUEUED` execution at attempt 0 for `instance`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn create(
        &self,
        instance: &ActionInstance,
        activation_mode_id: Option<ActivationModeId>,
        input: Payload,
        correlation_id: CorrelationId,
    ) -> Result<Execution, AreaflowError> {
        let execution = Execution::queued(
            instance.id,
            Some(instance.area_id),
            activation_mode_id,
            input,
            correlation_id,
        );
        self.insert(execution).await
    }

    /// Persist a pre-built execution; it must still be `QUEUED`.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::Validation`] for any other status, or a
    /// storage error from the repository.
    pub async fn insert(&self, execution: Execution) -> Result<Execution, AreaflowError> {
        if execution.status != ExecutionStatus::Queued {
            return Err(ValidationError::InvalidTransition {
                from: execution.status,
                to: ExecutionStatus::Queued,
            }
            .into());
        }
        let execution = self.repo.create(execution).await?;
        tracing::debug!(
            execution_id = %execution.id,
            action_instance_id = %execution.action_instance_id,
            correlation_id = %execution.correlation_id,
            "execution queued"
        );
        Ok(execution)
    }

    /// Look up an execution by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::NotFound`] when no execution with `id` exists,
    /// or a storage error from the repository.
    pub async fn get(&self, id: ExecutionId) -> Result<Execution, AreaflowError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| NotFoundError::new("Execution", id).into())
    }

    /// Apply a worker-reported outcome. A `RETRY` result bumps the attempt
    /// counter by exactly one.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::NotFound`] for an unknown id,
    /// [`AreaflowError::Validation`] for a forbidden transition, or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self, result), fields(execution_id = %result.execution_id, status = %result.status))]
    pub async fn record_result(&self, result: ExecutionResult) -> Result<Execution, AreaflowError> {
        let mut execution = self.get(result.execution_id).await?;
        execution.apply_result(result)?;
        let execution = self.repo.update(execution).await?;
        tracing::info!(attempt = execution.attempt, "execution result recorded");
        Ok(execution)
    }

    /// `QUEUED` (or `RETRY`) → `RUNNING`, stamping the start time.
    ///
    /// # Errors
    ///
    /// Same as [`record_result`](Self::record_result).
    pub async fn mark_started(&self, id: ExecutionId) -> Result<Execution, AreaflowError> {
        let mut execution = self.get(id).await?;
        execution.start()?;
        self.repo.update(execution).await
    }

    /// Cancel a non-terminal execution, recording `reason`.
    ///
    /// # Errors
    ///
    /// Same as [`record_result`](Self::record_result); cancelling a terminal
    /// execution is a validation error.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: ExecutionId, reason: &str) -> Result<Execution, AreaflowError> {
        let mut execution = self.get(id).await?;
        execution.cancel(reason)?;
        let execution = self.repo.update(execution).await?;
        tracing::info!("execution canceled");
        Ok(execution)
    }

    /// Put a `RETRY` execution back to `QUEUED` without touching its attempt count.
    ///
    /// # Errors
    ///
    /// Same as [`record_result`](Self::record_result).
    pub async fn requeue(&self, id: ExecutionId) -> Result<Execution, AreaflowError> {
        let mut execution = self.get(id).await?;
        execution.requeue()?;
        self.repo.update(execution).await
    }

    /// `QUEUED` executions, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn queued(&self) -> Result<Vec<Execution>, AreaflowError> {
        self.repo.find_queued().await
    }

    /// `RETRY` executions not started since at least `min_age`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn ready_for_retry(&self, min_age: Duration) -> Result<Vec<Execution>, AreaflowError> {
        self.repo.find_ready_for_retry(time::ago(min_age)).await
    }

    /// `RUNNING` executions started more than `timeout` ago.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn timed_out(&self, timeout: Duration) -> Result<Vec<Execution>, AreaflowError> {
        self.repo.find_timed_out(time::ago(timeout)).await
    }

    /// `FAILED` executions of an instance queued after `since`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn count_failed_since(
        &self,
        action_instance_id: ActionInstanceId,
        since: Timestamp,
    ) -> Result<u64, AreaflowError> {
        self.repo.count_failed_since(action_instance_id, since).await
    }

    /// Circuit-breaker helper: at least `max_failures` failures since `since`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn has_excessive_failures(
        &self,
        action_instance_id: ActionInstanceId,
        max_failures: u64,
        since: Timestamp,
    ) -> Result<bool, AreaflowError> {
        let failures = self.count_failed_since(action_instance_id, since).await?;
        Ok(failures >= max_failures)
    }

    /// Executions descended from one originating trigger, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<Execution>, AreaflowError> {
        self.repo.find_by_correlation(correlation_id).await
    }

    /// Execution counts for every status.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn statistics(&self) -> Result<ExecutionStatistics, AreaflowError> {
        let counts = self.repo.count_by_status().await?;
        let by_status: StatusCounts = ExecutionStatus::ALL
            .into_iter()
            .map(|status| (status, counts.get(&status).copied().unwrap_or(0)))
            .collect();
        Ok(ExecutionStatistics {
            total: by_status.values().sum(),
            by_status,
        })
    }

    /// Resolve executions stuck in `RUNNING` for longer than `timeout`.
    ///
    /// One failing execution does not stop the sweep.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the timed-out query itself fails.
    #[tracing::instrument(skip(self, retry))]
    pub async fn sweep_timed_out(
        &self,
        timeout: Duration,
        policy: TimeoutPolicy,
        retry: &RetryPolicy,
    ) -> Result<SweepReport, AreaflowError> {
        let mut report = SweepReport::default();
        for execution in self.timed_out(timeout).await? {
            let should_retry = policy == TimeoutPolicy::Retry && retry.should_retry(execution.attempt);
            let error = payload::from_json(json!({
                "reason": "timeout",
                "timeout_seconds": timeout.as_secs(),
                "detected_at": time::now().to_rfc3339(),
            }));
            let result = ExecutionResult::failure(execution.id, error, should_retry);
            match self.record_result(result).await {
                Ok(updated) if updated.status == ExecutionStatus::Retry => report.retried.push(updated.id),
                Ok(updated) => report.failed.push(updated.id),
                Err(err) => {
                    tracing::warn!(execution_id = %execution.id, %err, "failed to resolve timed out execution");
                }
            }
        }
        if !report.retried.is_empty() || !report.failed.is_empty() {
            tracing::info!(
                retried = report.retried.len(),
                failed = report.failed.len(),
                "timed out executions resolved"
            );
        }
        Ok(report)
    }
}
