//! Trigger dispatcher: turns a firing signal into an execution plus a
//! published [`AreaEvent`].

use std::future::Future;
use std::sync::Arc;

use areaflow_domain::action::ActionInstance;
use areaflow_domain::activation::ActivationKind;
use areaflow_domain::error::AreaflowError;
use areaflow_domain::event::AreaEvent;
use areaflow_domain::execution::Execution;
use areaflow_domain::id::{ActivationModeId, CorrelationId};
use areaflow_domain::payload::Payload;

use crate::ports::{EventPublisher, ExecutionRepository};
use crate::services::execution_service::ExecutionService;

/// Everything besides the action instance that describes one firing.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub kind: ActivationKind,
    pub activation_mode_id: Option<ActivationModeId>,
    pub input: Payload,
    pub correlation_id: CorrelationId,
    pub dedup_key: Option<String>,
}

impl Dispatch {
    #[must_use]
    pub fn new(kind: ActivationKind, input: Payload, correlation_id: CorrelationId) -> Self {
        Self {
            kind,
            activation_mode_id: None,
            input,
            correlation_id,
            dedup_key: None,
        }
    }

    /// A manual firing; a fresh correlation id is generated when none is given.
    #[must_use]
    pub fn manual(input: Payload, correlation_id: Option<CorrelationId>) -> Self {
        Self::new(
            ActivationKind::Manual,
            input,
            correlation_id.unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn activation_mode(mut self, id: ActivationModeId) -> Self {
        self.activation_mode_id = Some(id);
        self
    }

    #[must_use]
    pub fn dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }
}

/// Anything able to start an execution for an action instance.
///
/// The scheduler, the chain engine and the inbound intake only see this
/// trait, never the concrete dispatcher.
pub trait Dispatcher {
    fn dispatch(
        &self,
        instance: &ActionInstance,
        dispatch: Dispatch,
    ) -> impl Future<Output = Result<Execution, AreaflowError>> + Send;

    /// Manual invocation path.
    fn dispatch_manual(
        &self,
        instance: &ActionInstance,
        input: Payload,
        correlation_id: Option<CorrelationId>,
    ) -> impl Future<Output = Result<Execution, AreaflowError>> + Send {
        self.dispatch(instance, Dispatch::manual(input, correlation_id))
    }
}

impl<T: Dispatcher + Send + Sync> Dispatcher for Arc<T> {
    fn dispatch(
        &self,
        instance: &ActionInstance,
        dispatch: Dispatch,
    ) -> impl Future<Output = Result<Execution, AreaflowError>> + Send {
        (**self).dispatch(instance, dispatch)
    }
}

/// [`Dispatcher`] that records the execution, then publishes it.
pub struct TriggerDispatcher<R, P> {
    executions: Arc<ExecutionService<R>>,
    publisher: P,
}

impl<R, P> TriggerDispatcher<R, P> {
    pub fn new(executions: Arc<ExecutionService<R>>, publisher: P) -> Self {
        Self {
            executions,
            publisher,
        }
    }
}

impl<R, P> Dispatcher for TriggerDispatcher<R, P>
where
    R: ExecutionRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    /// The execution is persisted before publication and stays `QUEUED`
    /// when publication fails; the caller may dispatch again.
    #[tracing::instrument(
        skip(self, instance, dispatch),
        fields(action_instance_id = %instance.id, kind = %dispatch.kind, correlation_id = %dispatch.correlation_id)
    )]
    async fn dispatch(
        &self,
        instance: &ActionInstance,
        dispatch: Dispatch,
    ) -> Result<Execution, AreaflowError> {
        let mut execution = Execution::queued(
            instance.id,
            Some(instance.area_id),
            dispatch.activation_mode_id,
            dispatch.input,
            dispatch.correlation_id,
        );
        execution.dedup_key = dispatch.dedup_key;
        let execution = self.executions.insert(execution).await?;

        let event = AreaEvent::for_execution(&execution, dispatch.kind);
        if let Err(err) = self.publisher.publish(event).await {
            tracing::error!(execution_id = %execution.id, %err, "failed to publish dispatched execution");
            return Err(err);
        }

        tracing::info!(execution_id = %execution.id, "execution dispatched");
        Ok(execution)
    }
}
