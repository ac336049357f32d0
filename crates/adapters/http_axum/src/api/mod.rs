//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod executions;
pub mod sse;
#[allow(clippy::missing_errors_doc)]
pub mod triggers;
#[allow(clippy::missing_errors_doc)]
pub mod webhooks;

use std::str::FromStr;

use axum::Router;
use axum::routing::{get, post};

use areaflow_app::ports::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
    DedupStore, ExecutionRepository,
};
use areaflow_app::services::dispatcher::Dispatcher;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<R, D, S, IR, AR, MR, LR>() -> Router<AppState<R, D, S, IR, AR, MR, LR>>
where
    R: ExecutionRepository + Send + Sync + 'static,
    D: Dispatcher + Send + Sync + 'static,
    S: DedupStore + Send + Sync + 'static,
    IR: ActionInstanceRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    MR: ActivationModeRepository + Send + Sync + 'static,
    LR: ActionLinkRepository + Send + Sync + 'static,
{
    Router::new()
        // Inbound triggers
        .route(
            "/webhooks/{provider}/{action_instance_id}",
            post(webhooks::receive::<R, D, S, IR, AR, MR, LR>),
        )
        .route(
            "/action-instances/{id}/trigger",
            post(triggers::trigger::<R, D, S, IR, AR, MR, LR>),
        )
        // Executions
        .route(
            "/executions/stats",
            get(executions::stats::<R, D, S, IR, AR, MR, LR>),
        )
        .route(
            "/executions/{id}",
            get(executions::get::<R, D, S, IR, AR, MR, LR>),
        )
        .route(
            "/executions/{id}/cancel",
            post(executions::cancel::<R, D, S, IR, AR, MR, LR>),
        )
        .route(
            "/executions/{id}/result",
            post(executions::report_result::<R, D, S, IR, AR, MR, LR>),
        )
        // Live events
        .route(
            "/events/stream",
            get(sse::stream::<R, D, S, IR, AR, MR, LR>),
        )
}

/// Parse a path segment into a typed id.
pub(crate) fn parse_id<T: FromStr>(entity: &'static str, raw: &str) -> Result<T, ApiError> {
    T::from_str(raw).map_err(|_| ApiError::InvalidId {
        entity,
        value: raw.to_string(),
    })
}
