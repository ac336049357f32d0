//! Inbound trigger intake: entry point for provider webhooks and manual
//! invocations.

use areaflow_domain::action::ActionInstance;
use areaflow_domain::activation::ActivationKind;
use areaflow_domain::error::{AreaflowError, NotFoundError};
use areaflow_domain::execution::Execution;
use areaflow_domain::id::{ActionInstanceId, CorrelationId};
use areaflow_domain::payload::Payload;

use crate::ports::{ActionInstanceRepository, ActivationModeRepository, AreaRepository, DedupStore};
use crate::services::dedup_guard::{DedupGuard, dedup_key};
use crate::services::dispatcher::{Dispatch, Dispatcher};

/// What happened to an inbound trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeOutcome {
    Dispatched(Execution),
    /// The event was already received within its dedup window.
    Duplicate,
    /// The trigger is known but currently inactive.
    Skipped(String),
}

pub struct TriggerIntake<D, S, IR, AR, MR> {
    dispatcher: D,
    dedup: DedupGuard<S>,
    instances: IR,
    areas: AR,
    modes: MR,
}

impl<D, S, IR, AR, MR> TriggerIntake<D, S, IR, AR, MR>
where
    D: Dispatcher + Send + Sync,
    S: DedupStore + Send + Sync,
    IR: ActionInstanceRepository + Send + Sync,
    AR: AreaRepository + Send + Sync,
    MR: ActivationModeRepository + Send + Sync,
{
    pub fn new(dispatcher: D, dedup: DedupGuard<S>, instances: IR, areas: AR, modes: MR) -> Self {
        Self {
            dispatcher,
            dedup,
            instances,
            areas,
            modes,
        }
    }

    #[must_use]
    pub fn dedup(&self) -> &DedupGuard<S> {
        &self.dedup
    }

    /// Accept one provider delivery.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::NotFound`] for an unknown instance or area,
    /// and propagates storage and publish errors.
    #[tracing::instrument(skip(self, payload))]
    pub async fn receive_webhook(
        &self,
        provider: &str,
        event_id: &str,
        action_instance_id: ActionInstanceId,
        payload: Payload,
    ) -> Result<IntakeOutcome, AreaflowError> {
        if self.dedup.check_and_mark(event_id, provider, None).await {
            return Ok(IntakeOutcome::Duplicate);
        }

        let instance = match self.active_instance(action_instance_id).await? {
            Ok(instance) => instance,
            Err(reason) => return Ok(IntakeOutcome::Skipped(reason)),
        };

        let webhooks: Vec<_> = self
            .modes
            .find_by_action_instance(instance.id)
            .await?
            .into_iter()
            .filter(|mode| mode.kind == ActivationKind::Webhook)
            .collect();
        let mode = webhooks.iter().find(|mode| mode.enabled);
        if mode.is_none() && !webhooks.is_empty() {
            return Ok(IntakeOutcome::Skipped("webhook activation disabled".to_string()));
        }

        let mut dispatch = Dispatch::new(ActivationKind::Webhook, payload, CorrelationId::new())
            .dedup_key(dedup_key(provider, event_id));
        if let Some(mode) = mode {
            dispatch = dispatch.activation_mode(mode.id);
        }
        let execution = self.dispatcher.dispatch(&instance, dispatch).await?;
        Ok(IntakeOutcome::Dispatched(execution))
    }

    /// Fire an action instance by hand.
    ///
    /// # Errors
    ///
    /// Same as [`receive_webhook`](Self::receive_webhook).
    #[tracing::instrument(skip(self, payload))]
    pub async fn trigger_manual(
        &self,
        action_instance_id: ActionInstanceId,
        payload: Payload,
        correlation_id: Option<CorrelationId>,
    ) -> Result<IntakeOutcome, AreaflowError> {
        let instance = match self.active_instance(action_instance_id).await? {
            Ok(instance) => instance,
            Err(reason) => return Ok(IntakeOutcome::Skipped(reason)),
        };
        let execution = self
            .dispatcher
            .dispatch_manual(&instance, payload, correlation_id)
            .await?;
        Ok(IntakeOutcome::Dispatched(execution))
    }

    /// Load the instance and its area; the inner `Err` carries why it is inactive.
    async fn active_instance(
        &self,
        id: ActionInstanceId,
    ) -> Result<Result<ActionInstance, String>, AreaflowError> {
        let instance = self
            .instances
            .get_by_id(id)
            .await?
            .ok_or_else(|| NotFoundError::new("ActionInstance", id))?;
        if !instance.enabled {
            tracing::debug!("action instance disabled");
            return Ok(Err("action instance disabled".to_string()));
        }
        let area = self
            .areas
            .get_by_id(instance.area_id)
            .await?
            .ok_or_else(|| NotFoundError::new("Area", instance.area_id))?;
        if !area.enabled {
            tracing::debug!(area_id = %area.id, "area disabled");
            return Ok(Err("area disabled".to_string()));
        }
        Ok(Ok(instance))
    }
}
