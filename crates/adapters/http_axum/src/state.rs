//! Shared application state for axum handlers.

use std::sync::Arc;

use areaflow_app::event_bus::InProcessEventBus;
use areaflow_app::services::execution_service::ExecutionService;
use areaflow_app::services::reaction_chain::ReactionChainEngine;
use areaflow_app::services::trigger_intake::TriggerIntake;

/// Application state shared across all axum handlers.
///
/// Generic over the execution repository `R`, the dispatcher `D`, the dedup
/// store `S` and the configuration repositories (`IR` instances, `AR` areas,
/// `MR` activation modes, `LR` links) to avoid dynamic dispatch.
/// `Clone` is implemented manually so only the `Arc` wrappers are cloned.
pub struct AppState<R, D, S, IR, AR, MR, LR> {
    /// Execution lookups, cancellation and result recording.
    pub executions: Arc<ExecutionService<R>>,
    /// Webhook and manual trigger entry point.
    pub intake: Arc<TriggerIntake<D, S, IR, AR, MR>>,
    /// Follows action links and continues an area's chain once a worker
    /// reports success.
    pub chain: Arc<ReactionChainEngine<D, AR, IR, MR, LR>>,
    /// Source of the live event stream.
    pub event_bus: InProcessEventBus,
}

impl<R, D, S, IR, AR, MR, LR> Clone for AppState<R, D, S, IR, AR, MR, LR> {
    fn clone(&self) -> Self {
        Self {
            executions: Arc::clone(&self.executions),
            intake: Arc::clone(&self.intake),
            chain: Arc::clone(&self.chain),
            event_bus: self.event_bus.clone(),
        }
    }
}

impl<R, D, S, IR, AR, MR, LR> AppState<R, D, S, IR, AR, MR, LR> {
    /// Create the state from pre-wrapped services.
    ///
    /// The daemon shares the same `Arc`s with its background tasks.
    pub fn new(
        executions: Arc<ExecutionService<R>>,
        intake: Arc<TriggerIntake<D, S, IR, AR, MR>>,
        chain: Arc<ReactionChainEngine<D, AR, IR, MR, LR>>,
        event_bus: InProcessEventBus,
    ) -> Self {
        Self {
            executions,
            intake,
            chain,
            event_bus,
        }
    }
}
