//! Execution: one tracked unit of work and its lifecycle state machine.
//!
//! ```text
//! QUEUED ──► RUNNING ──► OK | FAILED | CANCELED
//!    │          │
//!    └──────────┴──► RETRY ──► QUEUED | RUNNING | …
//! ```
//!
//! `RETRY` is not terminal. Every transition *into* `RETRY` through
//! [`Execution::apply_result`] bumps the attempt counter by one; re-queueing
//! a retried execution does not.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{ActionInstanceId, ActivationModeId, AreaId, CorrelationId, ExecutionId};
use crate::payload::{Payload, Value};
use crate::time::{Timestamp, now};

/// Lifecycle status of an [`Execution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Ok,
    Retry,
    Failed,
    Canceled,
}

impl ExecutionStatus {
    pub const ALL: [Self; 6] = [
        Self::Queued,
        Self::Running,
        Self::Ok,
        Self::Retry,
        Self::Failed,
        Self::Canceled,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Ok => "OK",
            Self::Retry => "RETRY",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }

    /// `OK`, `FAILED` and `CANCELED` never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Failed | Self::Canceled)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Queued => next != Self::Queued,
            Self::Running => !matches!(next, Self::Queued | Self::Running),
            Self::Retry => true,
            Self::Ok | Self::Failed | Self::Canceled => false,
        }
    }

    fn check_transition(self, next: Self) -> Result<(), ValidationError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(ValidationError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownVariant {
                entity: "execution status",
                value: s.to_string(),
            })
    }
}

/// One unit of work created at trigger time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub action_instance_id: ActionInstanceId,
    pub activation_mode_id: Option<ActivationModeId>,
    pub area_id: Option<AreaId>,
    pub status: ExecutionStatus,
    pub attempt: u32,
    pub queued_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub input: Payload,
    pub output: Option<Payload>,
    pub error: Option<Payload>,
    pub correlation_id: CorrelationId,
    pub dedup_key: Option<String>,
}

impl Execution {
    /// A fresh `QUEUED` execution at attempt 0.
    #[must_use]
    pub fn queued(
        action_instance_id: ActionInstanceId,
        area_id: Option<AreaId>,
        activation_mode_id: Option<ActivationModeId>,
        input: Payload,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            action_instance_id,
            activation_mode_id,
            area_id,
            status: ExecutionStatus::Queued,
            attempt: 0,
            queued_at: now(),
            started_at: None,
            finished_at: None,
            input,
            output: None,
            error: None,
            correlation_id,
            dedup_key: None,
        }
    }

    #[must_use]
    pub fn with_dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }

    /// Apply a worker-reported outcome.
    ///
    /// Provided timestamps overwrite the stored ones; a terminal status
    /// without `finished_at` is stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`] when the state machine
    /// forbids the move; the execution is left untouched.
    pub fn apply_result(&mut self, result: ExecutionResult) -> Result<(), ValidationError> {
        self.status.check_transition(result.status)?;

        self.status = result.status;
        if result.status == ExecutionStatus::Retry {
            self.attempt = self.attempt.saturating_add(1);
        }
        if let Some(output) = result.output {
            self.output = Some(output);
        }
        if let Some(error) = result.error {
            self.error = Some(error);
        }
        if let Some(started_at) = result.started_at {
            self.started_at = Some(started_at);
        }
        match result.finished_at {
            Some(finished_at) => self.finished_at = Some(finished_at),
            None if result.status.is_terminal() => self.finished_at = Some(now()),
            None => {}
        }
        Ok(())
    }

    /// Move to `RUNNING` and stamp the start time.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`] unless the execution is
    /// `QUEUED` or `RETRY`.
    pub fn start(&mut self) -> Result<(), ValidationError> {
        self.status.check_transition(ExecutionStatus::Running)?;
        self.status = ExecutionStatus::Running;
        self.started_at = Some(now());
        Ok(())
    }

    /// Move to `CANCELED`, recording `reason` in the error payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`] when already terminal.
    pub fn cancel(&mut self, reason: &str) -> Result<(), ValidationError> {
        self.status.check_transition(ExecutionStatus::Canceled)?;
        let at = now();
        self.status = ExecutionStatus::Canceled;
        self.finished_at = Some(at);
        self.error = Some(Payload::from([
            ("reason".to_string(), Value::from(reason)),
            ("canceled_at".to_string(), Value::String(at.to_rfc3339())),
        ]));
        Ok(())
    }

    /// Put a `RETRY` execution back in the queue. The attempt counter was
    /// already bumped when the retry was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTransition`] unless the execution is
    /// `RETRY`.
    pub fn requeue(&mut self) -> Result<(), ValidationError> {
        if self.status != ExecutionStatus::Retry {
            return Err(ValidationError::InvalidTransition {
                from: self.status,
                to: ExecutionStatus::Queued,
            });
        }
        self.status = ExecutionStatus::Queued;
        self.queued_at = now();
        Ok(())
    }
}

/// Outcome reported for an execution by the worker side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    pub output: Option<Payload>,
    pub error: Option<Payload>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl ExecutionResult {
    #[must_use]
    pub fn new(execution_id: ExecutionId, status: ExecutionStatus) -> Self {
        Self {
            execution_id,
            status,
            output: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    #[must_use]
    pub fn success(execution_id: ExecutionId, output: Payload) -> Self {
        Self {
            output: Some(output),
            ..Self::new(execution_id, ExecutionStatus::Ok)
        }
    }

    /// `RETRY` when `should_retry`, `FAILED` otherwise.
    #[must_use]
    pub fn failure(execution_id: ExecutionId, error: Payload, should_retry: bool) -> Self {
        let status = if should_retry {
            ExecutionStatus::Retry
        } else {
            ExecutionStatus::Failed
        };
        Self {
            error: Some(error),
            ..Self::new(execution_id, status)
        }
    }

    #[must_use]
    pub fn started_at(mut self, at: Timestamp) -> Self {
        self.started_at = Some(at);
        self
    }

    #[must_use]
    pub fn finished_at(mut self, at: Timestamp) -> Self {
        self.finished_at = Some(at);
        self
    }

    /// Compact summary suitable for embedding into a follow-up payload.
    #[must_use]
    pub fn to_payload(&self) -> Payload {
        let mut summary = Payload::from([(
            "status".to_string(),
            Value::from(self.status.as_str()),
        )]);
        if let Some(output) = &self.output {
            summary.insert("output".to_string(), Value::Object(output.clone()));
        }
        if let Some(error) = &self.error {
            summary.insert("error".to_string(), Value::Object(error.clone()));
        }
        summary
    }
}
