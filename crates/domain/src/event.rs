//! AreaEvent: the message published for every dispatched execution.
//!
//! Consumed by the external worker pool that performs the actual
//! third-party calls. Serialised as snake_case JSON.

use serde::{Deserialize, Serialize};

use crate::activation::ActivationKind;
use crate::execution::Execution;
use crate::id::{ActionInstanceId, AreaId, CorrelationId, EventId, ExecutionId};
use crate::payload::Payload;
use crate::time::{Timestamp, now};

/// Who produced an event; informational only.
pub const SOURCE_TRIGGER_SERVICE: &str = "trigger_service";
pub const SOURCE_MANUAL_TRIGGER: &str = "manual_trigger";
pub const SOURCE_RETRY_SWEEPER: &str = "retry_sweeper";

/// `event_type` of executions put back in the queue.
pub const RETRY_EVENT_TYPE: &str = "retry";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaEvent {
    pub id: EventId,
    pub execution_id: ExecutionId,
    pub action_instance_id: ActionInstanceId,
    pub area_id: Option<AreaId>,
    /// Lowercase activation kind, e.g. `webhook`, or `retry` for requeued work.
    pub event_type: String,
    pub source: String,
    pub payload: Payload,
    pub correlation_id: CorrelationId,
    pub timestamp: Timestamp,
}

impl AreaEvent {
    /// Describe a freshly created execution.
    #[must_use]
    pub fn for_execution(execution: &Execution, kind: ActivationKind) -> Self {
        let source = if kind == ActivationKind::Manual {
            SOURCE_MANUAL_TRIGGER
        } else {
            SOURCE_TRIGGER_SERVICE
        };
        Self::describe(execution, kind.tag(), source)
    }

    /// Describe an execution requeued after a `RETRY` outcome.
    #[must_use]
    pub fn for_retry(execution: &Execution) -> Self {
        Self::describe(execution, RETRY_EVENT_TYPE, SOURCE_RETRY_SWEEPER)
    }

    fn describe(execution: &Execution, event_type: &str, source: &str) -> Self {
        Self {
            id: EventId::new(),
            execution_id: execution.id,
            action_instance_id: execution.action_instance_id,
            area_id: execution.area_id,
            event_type: event_type.to_string(),
            source: source.to_string(),
            payload: execution.input.clone(),
            correlation_id: execution.correlation_id,
            timestamp: now(),
        }
    }
}
