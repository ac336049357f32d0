//! Reaction chain engine: walks the ordered reactions of an area and
//! dispatches each one, threading an enriched payload from step to step.

use areaflow_domain::action::ActionInstance;
use areaflow_domain::activation::ActivationKind;
use areaflow_domain::area::Area;
use areaflow_domain::error::{AreaflowError, NotFoundError};
use areaflow_domain::execution::{Execution, ExecutionResult, ExecutionStatus};
use areaflow_domain::expression::{apply_mapping, evaluate_condition};
use areaflow_domain::id::{ActionInstanceId, AreaId, CorrelationId};
use areaflow_domain::payload::{Payload, Value};

use crate::ports::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
};
use crate::services::dispatcher::{Dispatch, Dispatcher};

/// Report of one chain walk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainOutcome {
    pub dispatched: Vec<Execution>,
    /// Reactions whose condition evaluated to false.
    pub skipped: Vec<ActionInstanceId>,
    /// Reactions whose dispatch failed.
    pub failed: Vec<ActionInstanceId>,
    /// Set when a failing reaction had `continue_on_error = false`.
    pub halted: bool,
    /// Payload after the last enrichment.
    pub final_payload: Payload,
}

/// Application service sequencing reactions within an area.
pub struct ReactionChainEngine<D, AR, IR, MR, LR> {
    dispatcher: D,
    areas: AR,
    instances: IR,
    modes: MR,
    links: LR,
}

impl<D, AR, IR, MR, LR> ReactionChainEngine<D, AR, IR, MR, LR>
where
    D: Dispatcher + Send + Sync,
    AR: AreaRepository + Send + Sync,
    IR: ActionInstanceRepository + Send + Sync,
    MR: ActivationModeRepository + Send + Sync,
    LR: ActionLinkRepository + Send + Sync,
{
    pub fn new(dispatcher: D, areas: AR, instances: IR, modes: MR, links: LR) -> Self {
        Self {
            dispatcher,
            areas,
            instances,
            modes,
            links,
        }
    }

    /// Dispatch every executable reaction of `area` in `order`.
    ///
    /// Dispatch failures never surface as errors: they are logged and, when
    /// the reaction says so, stop the walk with `halted` set.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the reactions cannot be loaded.
    #[tracing::instrument(skip(self, area, payload), fields(area_id = %area.id))]
    pub async fn process_chain(
        &self,
        area: &Area,
        payload: Payload,
        correlation_id: CorrelationId,
    ) -> Result<ChainOutcome, AreaflowError> {
        self.walk(area, payload, correlation_id, None).await
    }

    /// React to a result reported for `execution`.
    ///
    /// The chain is only re-entered for an `OK` trigger (a non-executable
    /// instance) whose area carries an enabled `CHAIN` activation. Reactions
    /// never re-enter, so a walk cannot feed itself. Returns `None` when the
    /// chain was not walked.
    ///
    /// # Errors
    ///
    /// Same as [`trigger_chain_reaction`](Self::trigger_chain_reaction).
    #[tracing::instrument(skip(self, execution, result), fields(execution_id = %execution.id))]
    pub async fn on_completion(
        &self,
        execution: &Execution,
        result: &ExecutionResult,
    ) -> Result<Option<ChainOutcome>, AreaflowError> {
        if result.status != ExecutionStatus::Ok {
            return Ok(None);
        }
        let (source, area) = self.source_and_area(execution).await?;
        if source.is_executable() {
            tracing::debug!(reaction = %source.name, "completed reaction, chain not re-entered");
            return Ok(None);
        }
        if !self.has_chain_activation(area.id).await? {
            tracing::debug!(area_id = %area.id, "no chain activation in area");
            return Ok(None);
        }
        self.continue_from(&source, &area, execution, result)
            .await
            .map(Some)
    }

    /// Continue the chain of a completed execution.
    ///
    /// The next steps receive the execution input plus `trigger_execution_id`,
    /// `trigger_result` and `source_action`. The completed instance itself is
    /// not dispatched again.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::NotFound`] when the instance or its area no
    /// longer exists, or a storage error.
    #[tracing::instrument(skip(self, execution, result), fields(execution_id = %execution.id))]
    pub async fn trigger_chain_reaction(
        &self,
        execution: &Execution,
        result: &ExecutionResult,
    ) -> Result<ChainOutcome, AreaflowError> {
        let (source, area) = self.source_and_area(execution).await?;
        self.continue_from(&source, &area, execution, result).await
    }

    /// Fan a freshly dispatched trigger execution out over the links of its
    /// action instance, with the execution input and correlation id.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::NotFound`] for an unknown instance, or a
    /// storage error when the links cannot be loaded.
    pub async fn follow_links(&self, execution: &Execution) -> Result<Vec<Execution>, AreaflowError> {
        let source = self
            .instances
            .get_by_id(execution.action_instance_id)
            .await?
            .ok_or_else(|| NotFoundError::new("ActionInstance", execution.action_instance_id))?;
        self.trigger_linked(&source, execution.input.clone(), execution.correlation_id)
            .await
    }

    /// Dispatch the targets linked from `source`, lowest link `order` first.
    ///
    /// Each link gates with its own condition and maps with its own mapping;
    /// failing targets are logged and skipped. A target's enabled `CHAIN`
    /// activation, if any, is recorded on its execution.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the links cannot be loaded.
    #[tracing::instrument(skip(self, source, payload), fields(source_id = %source.id))]
    pub async fn trigger_linked(
        &self,
        source: &ActionInstance,
        payload: Payload,
        correlation_id: CorrelationId,
    ) -> Result<Vec<Execution>, AreaflowError> {
        let mut links = self.links.find_by_source(source.id).await?;
        links.sort_by_key(|link| link.order);

        let mut dispatched = Vec::new();
        for link in links {
            let target = match self.instances.get_by_id(link.target_id).await {
                Ok(Some(target)) if target.enabled => target,
                Ok(_) => {
                    tracing::debug!(target_id = %link.target_id, "link target missing or disabled");
                    continue;
                }
                Err(err) => {
                    tracing::error!(target_id = %link.target_id, %err, "failed to load link target");
                    continue;
                }
            };
            if !evaluate_condition(&payload, link.condition.as_ref()) {
                tracing::debug!(link_id = %link.id, "link condition not met");
                continue;
            }
            let input = apply_mapping(&payload, &link.mapping);
            let mut dispatch = Dispatch::new(ActivationKind::Chain, input, correlation_id);
            match self.modes.find_by_action_instance(target.id).await {
                Ok(modes) => {
                    if let Some(mode) = modes
                        .iter()
                        .find(|m| m.enabled && m.kind == ActivationKind::Chain)
                    {
                        dispatch = dispatch.activation_mode(mode.id);
                    }
                }
                Err(err) => tracing::warn!(target_id = %target.id, %err, "failed to load target activations"),
            }
            match self.dispatcher.dispatch(&target, dispatch).await {
                Ok(execution) => dispatched.push(execution),
                Err(err) => {
                    tracing::error!(target_id = %target.id, %err, "linked dispatch failed");
                }
            }
        }
        Ok(dispatched)
    }

    async fn source_and_area(
        &self,
        execution: &Execution,
    ) -> Result<(ActionInstance, Area), AreaflowError> {
        let source = self
            .instances
            .get_by_id(execution.action_instance_id)
            .await?
            .ok_or_else(|| NotFoundError::new("ActionInstance", execution.action_instance_id))?;
        let area_id = execution.area_id.unwrap_or(source.area_id);
        let area = self
            .areas
            .get_by_id(area_id)
            .await?
            .ok_or_else(|| NotFoundError::new("Area", area_id))?;
        Ok((source, area))
    }

    /// Whether any instance of the area owns an enabled `CHAIN` activation.
    async fn has_chain_activation(&self, area_id: AreaId) -> Result<bool, AreaflowError> {
        let modes = self
            .modes
            .find_enabled_by_kinds(&[ActivationKind::Chain])
            .await?;
        for mode in modes {
            let owner = self.instances.get_by_id(mode.action_instance_id).await?;
            if owner.is_some_and(|instance| instance.area_id == area_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn continue_from(
        &self,
        source: &ActionInstance,
        area: &Area,
        execution: &Execution,
        result: &ExecutionResult,
    ) -> Result<ChainOutcome, AreaflowError> {
        let mut payload = execution.input.clone();
        payload.insert(
            "trigger_execution_id".to_string(),
            Value::from(execution.id.to_string()),
        );
        payload.insert(
            "trigger_result".to_string(),
            Value::Object(result.to_payload()),
        );
        payload.insert("source_action".to_string(), Value::from(source.name.as_str()));

        self.walk(area, payload, execution.correlation_id, Some(source.id))
            .await
    }

    async fn walk(
        &self,
        area: &Area,
        payload: Payload,
        correlation_id: CorrelationId,
        exclude: Option<ActionInstanceId>,
    ) -> Result<ChainOutcome, AreaflowError> {
        let mut outcome = ChainOutcome {
            final_payload: payload,
            ..ChainOutcome::default()
        };
        if !area.enabled {
            tracing::debug!("area disabled, chain not processed");
            return Ok(outcome);
        }

        let mut reactions: Vec<_> = self
            .instances
            .find_enabled_by_area(area.id)
            .await?
            .into_iter()
            .filter(|instance| instance.is_executable() && Some(instance.id) != exclude)
            .map(|instance| {
                let params = instance.reaction_params();
                (instance, params)
            })
            .collect();
        reactions.sort_by_key(|(_, params)| params.order);

        for (reaction, params) in reactions {
            let current = &outcome.final_payload;
            if !evaluate_condition(current, params.condition.as_ref()) {
                tracing::debug!(reaction = %reaction.name, "condition not met, reaction skipped");
                outcome.skipped.push(reaction.id);
                continue;
            }
            let input = match &params.mapping {
                Some(mapping) => apply_mapping(current, mapping),
                None => current.clone(),
            };

            match self
                .dispatcher
                .dispatch_manual(&reaction, input, Some(correlation_id))
                .await
            {
                Ok(execution) => {
                    enrich(&mut outcome.final_payload, &reaction, &execution);
                    outcome.dispatched.push(execution);
                }
                Err(err) => {
                    tracing::error!(reaction = %reaction.name, %err, "reaction dispatch failed");
                    outcome.failed.push(reaction.id);
                    if !params.continue_on_error {
                        outcome.halted = true;
                        break;
                    }
                }
            }
        }

        tracing::info!(
            dispatched = outcome.dispatched.len(),
            skipped = outcome.skipped.len(),
            failed = outcome.failed.len(),
            halted = outcome.halted,
            "chain processed"
        );
        Ok(outcome)
    }
}

/// Carry the last step forward to the next one.
fn enrich(payload: &mut Payload, reaction: &ActionInstance, execution: &Execution) {
    let step = payload
        .get("chain_step")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let previous_result = Payload::from([
        ("status".to_string(), Value::from("queued")),
        ("execution_id".to_string(), Value::from(execution.id.to_string())),
        (
            "reaction_type".to_string(),
            Value::from(reaction.definition.key.as_str()),
        ),
    ]);
    payload.insert(
        "previous_execution_id".to_string(),
        Value::from(execution.id.to_string()),
    );
    payload.insert(
        "previous_reaction_name".to_string(),
        Value::from(reaction.name.as_str()),
    );
    payload.insert("chain_step".to_string(), Value::Int(step + 1));
    payload.insert("previous_result".to_string(), Value::Object(previous_result));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{
        InMemoryAreas, InMemoryInstances, InMemoryLinks, InMemoryModes, SpyDispatcher, area,
        instance_in,
    };
    use areaflow_domain::action_link::{ActionLink, LinkKind};
    use areaflow_domain::activation::ActivationMode;
    use areaflow_domain::id::ActionLinkId;
    use areaflow_domain::payload::from_json;
    use areaflow_domain::time::now;
    use serde_json::json;

    type Engine = ReactionChainEngine<
        Arc<SpyDispatcher>,
        Arc<InMemoryAreas>,
        Arc<InMemoryInstances>,
        Arc<InMemoryModes>,
        Arc<InMemoryLinks>,
    >;

    struct Fixture {
        engine: Engine,
        dispatcher: Arc<SpyDispatcher>,
        areas: Arc<InMemoryAreas>,
        instances: Arc<InMemoryInstances>,
        modes: Arc<InMemoryModes>,
        links: Arc<InMemoryLinks>,
    }

    fn fixture() -> Fixture {
        let dispatcher = Arc::new(SpyDispatcher::default());
        let areas = Arc::new(InMemoryAreas::default());
        let instances = Arc::new(InMemoryInstances::default());
        let modes = Arc::new(InMemoryModes::default());
        let links = Arc::new(InMemoryLinks::default());
        let engine = ReactionChainEngine::new(
            Arc::clone(&dispatcher),
            Arc::clone(&areas),
            Arc::clone(&instances),
            Arc::clone(&modes),
            Arc::clone(&links),
        );
        Fixture {
            engine,
            dispatcher,
            areas,
            instances,
            modes,
            links,
        }
    }

    async fn chain_mode(fx: &Fixture, owner: &ActionInstance, enabled: bool) -> ActivationMode {
        let mode = ActivationMode::builder()
            .action_instance_id(owner.id)
            .kind(ActivationKind::Chain)
            .enabled(enabled)
            .build()
            .unwrap();
        fx.modes.create(mode).await.unwrap()
    }

    fn completed(instance: &ActionInstance, area: &Area) -> (Execution, ExecutionResult) {
        let execution = Execution::queued(
            instance.id,
            Some(area.id),
            None,
            Payload::new(),
            CorrelationId::new(),
        );
        let result = ExecutionResult::success(execution.id, Payload::new());
        (execution, result)
    }

    async fn reaction(fx: &Fixture, area: &Area, name: &str, params: serde_json::Value) -> ActionInstance {
        let mut reaction = instance_in(area.id, name, true);
        reaction.params = from_json(params);
        fx.instances.create(reaction).await.unwrap()
    }

    async fn stored_area(fx: &Fixture) -> Area {
        fx.areas.create(area("chain")).await.unwrap()
    }

    #[tokio::test]
    async fn should_dispatch_reactions_in_order() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        reaction(&fx, &area, "A", json!({"order": 2})).await;
        reaction(&fx, &area, "B", json!({"order": 0})).await;
        reaction(&fx, &area, "C", json!({"order": 1})).await;

        let outcome = fx
            .engine
            .process_chain(&area, Payload::new(), CorrelationId::new())
            .await
            .unwrap();

        assert_eq!(fx.dispatcher.dispatched_names(), vec!["B", "C", "A"]);
        assert_eq!(outcome.dispatched.len(), 3);
        assert_eq!(outcome.final_payload["chain_step"], Value::Int(3));
        assert_eq!(
            outcome.final_payload["previous_reaction_name"],
            Value::from("A")
        );
    }

    #[tokio::test]
    async fn should_keep_declaration_order_for_equal_order() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        reaction(&fx, &area, "first", json!({})).await;
        reaction(&fx, &area, "second", json!({})).await;

        fx.engine
            .process_chain(&area, Payload::new(), CorrelationId::new())
            .await
            .unwrap();

        assert_eq!(fx.dispatcher.dispatched_names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn should_share_correlation_id_and_thread_enriched_payload() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        reaction(&fx, &area, "notify", json!({"order": 0})).await;
        reaction(&fx, &area, "archive", json!({"order": 1})).await;
        let correlation = CorrelationId::new();

        let outcome = fx
            .engine
            .process_chain(&area, from_json(json!({"issue": 7})), correlation)
            .await
            .unwrap();

        let calls = fx.dispatcher.calls();
        assert!(calls.iter().all(|c| c.dispatch.correlation_id == correlation));
        assert!(calls.iter().all(|c| c.dispatch.kind == ActivationKind::Manual));
        assert!(!calls[0].dispatch.input.contains_key("chain_step"));

        let second = &calls[1].dispatch.input;
        assert_eq!(second["issue"], Value::Int(7));
        assert_eq!(second["chain_step"], Value::Int(1));
        assert_eq!(
            second["previous_execution_id"],
            Value::from(outcome.dispatched[0].id.to_string())
        );
        let previous = second["previous_result"].as_object().unwrap();
        assert_eq!(previous["status"], Value::from("queued"));
        assert_eq!(previous["reaction_type"], Value::from("http.request"));
    }

    #[tokio::test]
    async fn should_skip_reaction_when_condition_false() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let skipped = reaction(
            &fx,
            &area,
            "only-main",
            json!({"condition": {"field": "branch", "operator": "equals", "value": "main"}}),
        )
        .await;
        reaction(&fx, &area, "always", json!({"order": 1})).await;

        let outcome = fx
            .engine
            .process_chain(&area, from_json(json!({"branch": "dev"})), CorrelationId::new())
            .await
            .unwrap();

        assert_eq!(outcome.skipped, vec![skipped.id]);
        assert_eq!(fx.dispatcher.dispatched_names(), vec!["always"]);
    }

    #[tokio::test]
    async fn should_apply_mapping_before_dispatch() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        reaction(
            &fx,
            &area,
            "post",
            json!({"mapping": {"title": "{{ issue.title }}", "channel": {"type": "string", "default": "general"}}}),
        )
        .await;

        fx.engine
            .process_chain(
                &area,
                from_json(json!({"issue": {"title": "Broken build"}})),
                CorrelationId::new(),
            )
            .await
            .unwrap();

        let input = &fx.dispatcher.calls()[0].dispatch.input;
        assert_eq!(input["title"], Value::from("Broken build"));
        assert_eq!(input["channel"], Value::from("general"));
        assert!(!input.contains_key("issue"));
    }

    #[tokio::test]
    async fn should_continue_after_failure_by_default() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let broken = reaction(&fx, &area, "broken", json!({"order": 0})).await;
        reaction(&fx, &area, "next", json!({"order": 1})).await;
        fx.dispatcher.fail_for(broken.id);

        let outcome = fx
            .engine
            .process_chain(&area, Payload::new(), CorrelationId::new())
            .await
            .unwrap();

        assert_eq!(outcome.failed, vec![broken.id]);
        assert!(!outcome.halted);
        assert_eq!(outcome.dispatched.len(), 1);
    }

    #[tokio::test]
    async fn should_halt_when_continue_on_error_is_false() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let broken = reaction(
            &fx,
            &area,
            "broken",
            json!({"order": 0, "continue_on_error": false}),
        )
        .await;
        reaction(&fx, &area, "never", json!({"order": 1})).await;
        fx.dispatcher.fail_for(broken.id);

        let outcome = fx
            .engine
            .process_chain(&area, Payload::new(), CorrelationId::new())
            .await
            .unwrap();

        assert!(outcome.halted);
        assert!(outcome.dispatched.is_empty());
        assert_eq!(fx.dispatcher.dispatched_names(), vec!["broken"]);
    }

    #[tokio::test]
    async fn should_ignore_trigger_only_and_disabled_instances() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        fx.instances
            .create(instance_in(area.id, "trigger", false))
            .await
            .unwrap();
        let mut disabled = instance_in(area.id, "off", true);
        disabled.enabled = false;
        fx.instances.create(disabled).await.unwrap();
        reaction(&fx, &area, "on", json!({})).await;

        fx.engine
            .process_chain(&area, Payload::new(), CorrelationId::new())
            .await
            .unwrap();

        assert_eq!(fx.dispatcher.dispatched_names(), vec!["on"]);
    }

    #[tokio::test]
    async fn should_do_nothing_for_disabled_area() {
        let fx = fixture();
        let mut area = stored_area(&fx).await;
        area.enabled = false;
        reaction(&fx, &area, "r", json!({})).await;

        let outcome = fx
            .engine
            .process_chain(&area, Payload::new(), CorrelationId::new())
            .await
            .unwrap();

        assert!(outcome.dispatched.is_empty());
        assert!(fx.dispatcher.calls().is_empty());
    }

    #[tokio::test]
    async fn should_seed_chain_from_completed_execution() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let source = fx
            .instances
            .create(instance_in(area.id, "push received", false))
            .await
            .unwrap();
        reaction(&fx, &area, "notify", json!({})).await;
        let correlation = CorrelationId::new();
        let execution = Execution::queued(
            source.id,
            Some(area.id),
            None,
            from_json(json!({"repo": "areaflow"})),
            correlation,
        );
        let result = ExecutionResult::success(execution.id, from_json(json!({"ok": true})));

        fx.engine
            .trigger_chain_reaction(&execution, &result)
            .await
            .unwrap();

        let call = &fx.dispatcher.calls()[0];
        assert_eq!(call.dispatch.correlation_id, correlation);
        let input = &call.dispatch.input;
        assert_eq!(input["repo"], Value::from("areaflow"));
        assert_eq!(input["source_action"], Value::from("push received"));
        assert_eq!(
            input["trigger_execution_id"],
            Value::from(execution.id.to_string())
        );
        let trigger_result = input["trigger_result"].as_object().unwrap();
        assert_eq!(
            trigger_result["status"],
            Value::from(ExecutionStatus::Ok.as_str())
        );
    }

    #[tokio::test]
    async fn should_not_redispatch_completed_reaction() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let first = reaction(&fx, &area, "first", json!({"order": 0})).await;
        reaction(&fx, &area, "second", json!({"order": 1})).await;
        let execution = Execution::queued(
            first.id,
            Some(area.id),
            None,
            Payload::new(),
            CorrelationId::new(),
        );

        fx.engine
            .trigger_chain_reaction(&execution, &ExecutionResult::success(execution.id, Payload::new()))
            .await
            .unwrap();

        assert_eq!(fx.dispatcher.dispatched_names(), vec!["second"]);
    }

    #[tokio::test]
    async fn should_fail_chain_reaction_for_unknown_instance() {
        let fx = fixture();
        let execution = Execution::queued(
            ActionInstanceId::new(),
            None,
            None,
            Payload::new(),
            CorrelationId::new(),
        );

        let result = fx
            .engine
            .trigger_chain_reaction(&execution, &ExecutionResult::success(execution.id, Payload::new()))
            .await;

        assert!(matches!(result, Err(AreaflowError::NotFound(_))));
    }

    fn link(source: &ActionInstance, target: &ActionInstance, order: i64, extra: serde_json::Value) -> ActionLink {
        let extra = from_json(extra);
        ActionLink {
            id: ActionLinkId::new(),
            area_id: source.area_id,
            source_id: source.id,
            target_id: target.id,
            kind: LinkKind::Chain,
            mapping: extra
                .get("mapping")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            condition: extra.get("condition").cloned(),
            order,
            created_at: now(),
        }
    }

    #[tokio::test]
    async fn should_dispatch_linked_targets_by_link_order() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let source = reaction(&fx, &area, "source", json!({})).await;
        let late = reaction(&fx, &area, "late", json!({})).await;
        let early = reaction(&fx, &area, "early", json!({})).await;
        let gated = reaction(&fx, &area, "gated", json!({})).await;
        let mut off = instance_in(area.id, "off", true);
        off.enabled = false;
        let off = fx.instances.create(off).await.unwrap();

        fx.links.create(link(&source, &late, 5, json!({}))).await.unwrap();
        fx.links
            .create(link(&source, &early, 1, json!({"mapping": {"n": "count"}})))
            .await
            .unwrap();
        fx.links
            .create(link(
                &source,
                &gated,
                2,
                json!({"condition": {"field": "count", "operator": "greater_than", "value": 10}}),
            ))
            .await
            .unwrap();
        fx.links.create(link(&source, &off, 0, json!({}))).await.unwrap();

        let correlation = CorrelationId::new();
        let executions = fx
            .engine
            .trigger_linked(&source, from_json(json!({"count": 3})), correlation)
            .await
            .unwrap();

        assert_eq!(executions.len(), 2);
        assert_eq!(fx.dispatcher.dispatched_names(), vec!["early", "late"]);
        let calls = fx.dispatcher.calls();
        assert!(calls.iter().all(|c| c.dispatch.kind == ActivationKind::Chain));
        assert!(calls.iter().all(|c| c.dispatch.correlation_id == correlation));
        assert_eq!(calls[0].dispatch.input, from_json(json!({"n": 3})));
    }

    #[tokio::test]
    async fn should_reenter_chain_for_trigger_when_area_has_chain_activation() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let trigger = fx
            .instances
            .create(instance_in(area.id, "push", false))
            .await
            .unwrap();
        let first = reaction(&fx, &area, "first", json!({"order": 0})).await;
        reaction(&fx, &area, "second", json!({"order": 1})).await;
        chain_mode(&fx, &first, true).await;
        let (execution, result) = completed(&trigger, &area);

        let outcome = fx.engine.on_completion(&execution, &result).await.unwrap();

        assert_eq!(outcome.map(|o| o.dispatched.len()), Some(2));
        assert_eq!(fx.dispatcher.dispatched_names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn should_not_reenter_chain_without_enabled_chain_activation() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let trigger = fx
            .instances
            .create(instance_in(area.id, "push", false))
            .await
            .unwrap();
        let notify = reaction(&fx, &area, "notify", json!({})).await;
        chain_mode(&fx, &notify, false).await;
        let other_area = fx.areas.create(crate::testing::area("elsewhere")).await.unwrap();
        let foreign = reaction(&fx, &other_area, "foreign", json!({})).await;
        chain_mode(&fx, &foreign, true).await;
        let (execution, result) = completed(&trigger, &area);

        let outcome = fx.engine.on_completion(&execution, &result).await.unwrap();

        assert!(outcome.is_none());
        assert!(fx.dispatcher.calls().is_empty());
    }

    #[tokio::test]
    async fn should_stop_once_every_reaction_reports_ok() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let trigger = fx
            .instances
            .create(instance_in(area.id, "push", false))
            .await
            .unwrap();
        let r1 = reaction(&fx, &area, "r1", json!({"order": 0})).await;
        reaction(&fx, &area, "r2", json!({"order": 1})).await;
        chain_mode(&fx, &r1, true).await;
        let (execution, result) = completed(&trigger, &area);
        let outcome = fx
            .engine
            .on_completion(&execution, &result)
            .await
            .unwrap()
            .unwrap();

        for follow_up in &outcome.dispatched {
            let result = ExecutionResult::success(follow_up.id, Payload::new());
            let again = fx.engine.on_completion(follow_up, &result).await.unwrap();
            assert!(again.is_none());
        }

        assert_eq!(fx.dispatcher.dispatched_names(), vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn should_ignore_results_other_than_ok() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let trigger = fx
            .instances
            .create(instance_in(area.id, "push", false))
            .await
            .unwrap();
        let notify = reaction(&fx, &area, "notify", json!({})).await;
        chain_mode(&fx, &notify, true).await;
        let (execution, _) = completed(&trigger, &area);
        let failed = ExecutionResult::failure(execution.id, Payload::new(), true);

        let outcome = fx.engine.on_completion(&execution, &failed).await.unwrap();

        assert!(outcome.is_none());
        assert!(fx.dispatcher.calls().is_empty());
    }

    #[tokio::test]
    async fn should_follow_links_of_dispatched_trigger() {
        let fx = fixture();
        let area = stored_area(&fx).await;
        let trigger = fx
            .instances
            .create(instance_in(area.id, "push", false))
            .await
            .unwrap();
        let target = reaction(&fx, &area, "deploy", json!({})).await;
        let mode = chain_mode(&fx, &target, true).await;
        fx.links
            .create(link(&trigger, &target, 0, json!({"mapping": {"branch": "ref"}})))
            .await
            .unwrap();
        let correlation = CorrelationId::new();
        let execution = Execution::queued(
            trigger.id,
            Some(area.id),
            None,
            from_json(json!({"ref": "main"})),
            correlation,
        );

        let linked = fx.engine.follow_links(&execution).await.unwrap();

        assert_eq!(linked.len(), 1);
        let call = &fx.dispatcher.calls()[0];
        assert_eq!(call.dispatch.kind, ActivationKind::Chain);
        assert_eq!(call.dispatch.activation_mode_id, Some(mode.id));
        assert_eq!(call.dispatch.correlation_id, correlation);
        assert_eq!(call.dispatch.input, from_json(json!({"branch": "main"})));
    }
}
