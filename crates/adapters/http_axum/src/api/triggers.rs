//! Manual trigger endpoint.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use areaflow_app::ports::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
    DedupStore, ExecutionRepository,
};
use areaflow_app::services::dispatcher::Dispatcher;
use areaflow_app::services::trigger_intake::IntakeOutcome;
use areaflow_domain::execution::Execution;
use areaflow_domain::id::{ActionInstanceId, CorrelationId};
use areaflow_domain::payload::Payload;

use crate::api::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for a manual trigger; both fields are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TriggerRequest {
    pub payload: Payload,
    pub correlation_id: Option<CorrelationId>,
}

/// Possible responses from the trigger endpoint.
pub enum TriggerResponse {
    Accepted(Json<Execution>),
    Skipped(String),
}

impl IntoResponse for TriggerResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted(json) => (StatusCode::ACCEPTED, json).into_response(),
            Self::Skipped(reason) => (
                StatusCode::CONFLICT,
                Json(json!({ "status": "skipped", "reason": reason })),
            )
                .into_response(),
        }
    }
}

/// `POST /api/action-instances/{id}/trigger`
///
/// Linked targets are dispatched alongside; the response carries the
/// triggered execution only.
pub async fn trigger<R, D, S, IR, AR, MR, LR>(
    State(state): State<AppState<R, D, S, IR, AR, MR, LR>>,
    Path(id): Path<String>,
    body: Option<Json<TriggerRequest>>,
) -> Result<TriggerResponse, ApiError>
where
    R: ExecutionRepository + Send + Sync + 'static,
    D: Dispatcher + Send + Sync + 'static,
    S: DedupStore + Send + Sync + 'static,
    IR: ActionInstanceRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    MR: ActivationModeRepository + Send + Sync + 'static,
    LR: ActionLinkRepository + Send + Sync + 'static,
{
    let id: ActionInstanceId = parse_id("ActionInstance", &id)?;
    let request = body.map(|Json(request)| request).unwrap_or_default();

    let outcome = state
        .intake
        .trigger_manual(id, request.payload, request.correlation_id)
        .await?;
    Ok(match outcome {
        IntakeOutcome::Dispatched(execution) => {
            match state.chain.follow_links(&execution).await {
                Ok(linked) if !linked.is_empty() => {
                    tracing::info!(execution_id = %execution.id, linked = linked.len(), "action links followed");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(execution_id = %execution.id, %err, "failed to follow action links");
                }
            }
            TriggerResponse::Accepted(Json(execution))
        }
        IntakeOutcome::Skipped(reason) => TriggerResponse::Skipped(reason),
        // manual triggers are never deduplicated
        IntakeOutcome::Duplicate => TriggerResponse::Skipped("duplicate".to_string()),
    })
}
