//! Provider webhook intake.

use std::hash::{DefaultHasher, Hash, Hasher};

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use areaflow_app::ports::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
    DedupStore, ExecutionRepository,
};
use areaflow_app::services::dispatcher::Dispatcher;
use areaflow_app::services::trigger_intake::IntakeOutcome;
use areaflow_domain::execution::Execution;
use areaflow_domain::id::{ActionInstanceId, ExecutionId};
use areaflow_domain::payload::{Payload, Value};

use crate::api::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Headers checked for a provider event id, first match wins.
const EVENT_ID_HEADERS: [&str; 3] = ["x-event-id", "x-github-delivery", "x-slack-request-id"];

/// Possible responses from the webhook endpoint.
pub enum ReceiveResponse {
    Accepted {
        event_id: String,
        execution: Execution,
        linked: Vec<ExecutionId>,
    },
    Duplicate { event_id: String },
    Skipped { event_id: String, reason: String },
}

impl IntoResponse for ReceiveResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted {
                event_id,
                execution,
                linked,
            } => (
                StatusCode::ACCEPTED,
                Json(json!({
                    "status": "dispatched",
                    "event_id": event_id,
                    "execution": execution,
                    "linked": linked,
                })),
            )
                .into_response(),
            Self::Duplicate { event_id } => {
                Json(json!({ "status": "duplicate", "event_id": event_id })).into_response()
            }
            Self::Skipped { event_id, reason } => Json(json!({
                "status": "skipped",
                "event_id": event_id,
                "reason": reason,
            }))
            .into_response(),
        }
    }
}

/// `POST /api/webhooks/{provider}/{action_instance_id}`
///
/// A dispatched trigger is fanned out over its action links right away.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn receive<R, D, S, IR, AR, MR, LR>(
    State(state): State<AppState<R, D, S, IR, AR, MR, LR>>,
    Path((provider, action_instance_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(payload): Json<Payload>,
) -> Result<ReceiveResponse, ApiError>
where
    R: ExecutionRepository + Send + Sync + 'static,
    D: Dispatcher + Send + Sync + 'static,
    S: DedupStore + Send + Sync + 'static,
    IR: ActionInstanceRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    MR: ActivationModeRepository + Send + Sync + 'static,
    LR: ActionLinkRepository + Send + Sync + 'static,
{
    let id: ActionInstanceId = parse_id("ActionInstance", &action_instance_id)?;
    let event_id = extract_event_id(&provider, &headers, &payload);
    tracing::info!(%event_id, "webhook received");

    let outcome = state
        .intake
        .receive_webhook(&provider, &event_id, id, payload)
        .await?;
    Ok(match outcome {
        IntakeOutcome::Dispatched(execution) => {
            let linked = match state.chain.follow_links(&execution).await {
                Ok(linked) => linked.iter().map(|e| e.id).collect(),
                Err(err) => {
                    tracing::warn!(execution_id = %execution.id, %err, "failed to follow action links");
                    Vec::new()
                }
            };
            ReceiveResponse::Accepted {
                event_id,
                execution,
                linked,
            }
        }
        IntakeOutcome::Duplicate => ReceiveResponse::Duplicate { event_id },
        IntakeOutcome::Skipped(reason) => ReceiveResponse::Skipped { event_id, reason },
    })
}

/// Find the provider's delivery id in the headers, then in the body.
///
/// Deliveries without any id get a synthetic one built from the provider,
/// the arrival time and a hash of the body, so they are never deduplicated.
pub fn extract_event_id(provider: &str, headers: &HeaderMap, payload: &Payload) -> String {
    let from_header = EVENT_ID_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    });
    if let Some(id) = from_header {
        return id.to_string();
    }

    let nested = payload
        .get("message")
        .and_then(Value::as_object)
        .and_then(|message| message.get("messageId"));
    let from_body = payload
        .get("event_id")
        .or_else(|| payload.get("id"))
        .or(nested)
        .and_then(scalar_to_string);
    if let Some(id) = from_body {
        return id;
    }

    let mut hasher = DefaultHasher::new();
    serde_json::to_string(payload)
        .unwrap_or_default()
        .hash(&mut hasher);
    format!(
        "{}_{}_{:x}",
        provider.to_lowercase(),
        chrono::Utc::now().timestamp_millis(),
        hasher.finish()
    )
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Int(n) => Some(n.to_string()),
        _ => None,
    }
}
