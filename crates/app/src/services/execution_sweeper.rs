//! Periodic execution maintenance: resolves lost `RUNNING` executions and
//! puts `RETRY` executions back in the queue once their backoff elapsed.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use areaflow_domain::error::AreaflowError;
use areaflow_domain::event::AreaEvent;
use areaflow_domain::execution::{Execution, ExecutionResult};
use areaflow_domain::id::ExecutionId;
use areaflow_domain::payload::{self, Payload, Value};
use areaflow_domain::retry::RetryPolicy;
use areaflow_domain::time;

use crate::ports::{EventPublisher, ExecutionRepository};
use crate::services::execution_service::{ExecutionService, SweepReport, TimeoutPolicy};

/// Outcome of one [`ExecutionSweeper::sweep`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub timed_out: SweepReport,
    pub requeued: Vec<ExecutionId>,
    /// `RETRY` executions past the attempt budget, now `FAILED`.
    pub exhausted: Vec<ExecutionId>,
    /// `RETRY` executions whose error is not worth another attempt, now `FAILED`.
    pub permanent: Vec<ExecutionId>,
}

pub struct ExecutionSweeper<R, P> {
    executions: Arc<ExecutionService<R>>,
    publisher: P,
    timeout: Duration,
    policy: TimeoutPolicy,
    retry: RetryPolicy,
}

impl<R, P> ExecutionSweeper<R, P>
where
    R: ExecutionRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    pub fn new(
        executions: Arc<ExecutionService<R>>,
        publisher: P,
        timeout: Duration,
        policy: TimeoutPolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            executions,
            publisher,
            timeout,
            policy,
            retry,
        }
    }

    /// Run one maintenance pass.
    ///
    /// # Errors
    ///
    /// Returns a storage error when a query fails. Per-execution failures are
    /// logged and skipped.
    pub async fn sweep(&self) -> Result<SweepSummary, AreaflowError> {
        let timed_out = self
            .executions
            .sweep_timed_out(self.timeout, self.policy, &self.retry)
            .await?;
        let mut summary = SweepSummary {
            timed_out,
            ..SweepSummary::default()
        };
        self.requeue_due(&mut summary).await?;
        Ok(summary)
    }

    async fn requeue_due(&self, summary: &mut SweepSummary) -> Result<(), AreaflowError> {
        let now = time::now();
        for execution in self.executions.ready_for_retry(self.retry.base_delay).await? {
            // the attempt counter already includes the failed run
            let previous = execution.attempt.saturating_sub(1);
            let Some(delay) = self.retry.delay_for(previous) else {
                let error = payload::from_json(json!({
                    "reason": "retries exhausted",
                    "attempts": execution.attempt,
                }));
                if let Some(id) = self.close(&execution, error).await {
                    summary.exhausted.push(id);
                }
                continue;
            };

            let message = error_message(&execution);
            if !self.retry.should_retry_error(previous, message) {
                let error = payload::from_json(json!({
                    "reason": "permanent error",
                    "message": message,
                    "attempts": execution.attempt,
                }));
                if let Some(id) = self.close(&execution, error).await {
                    summary.permanent.push(id);
                }
                continue;
            }

            let since = execution.started_at.unwrap_or(execution.queued_at);
            let waited = (now - since).to_std().unwrap_or_default();
            if waited < delay {
                continue;
            }

            let requeued = match self.executions.requeue(execution.id).await {
                Ok(requeued) => requeued,
                Err(err) => {
                    tracing::warn!(execution_id = %execution.id, %err, "failed to requeue execution");
                    continue;
                }
            };
            if let Err(err) = self.publisher.publish(AreaEvent::for_retry(&requeued)).await {
                // stays QUEUED and visible to queue polling
                tracing::warn!(execution_id = %requeued.id, %err, "failed to publish requeued execution");
            }
            summary.requeued.push(requeued.id);
        }

        if !summary.requeued.is_empty()
            || !summary.exhausted.is_empty()
            || !summary.permanent.is_empty()
        {
            tracing::info!(
                requeued = summary.requeued.len(),
                exhausted = summary.exhausted.len(),
                permanent = summary.permanent.len(),
                "retry executions processed"
            );
        }
        Ok(())
    }

    async fn close(&self, execution: &Execution, error: Payload) -> Option<ExecutionId> {
        let result = ExecutionResult::failure(execution.id, error, false);
        match self.executions.record_result(result).await {
            Ok(failed) => Some(failed.id),
            Err(err) => {
                tracing::warn!(execution_id = %execution.id, %err, "failed to close retry execution");
                None
            }
        }
    }
}

/// The `message` a worker attached to its failure, empty when absent.
fn error_message(execution: &Execution) -> &str {
    execution
        .error
        .as_ref()
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}
