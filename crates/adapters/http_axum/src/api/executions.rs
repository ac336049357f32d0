//! JSON REST handlers for executions.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use areaflow_app::ports::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
    DedupStore, ExecutionRepository,
};
use areaflow_app::services::dispatcher::Dispatcher;
use areaflow_app::services::execution_service::ExecutionStatistics;
use areaflow_app::services::reaction_chain::ChainOutcome;
use areaflow_domain::execution::{Execution, ExecutionResult, ExecutionStatus};
use areaflow_domain::id::{ActionInstanceId, ExecutionId};
use areaflow_domain::payload::Payload;
use areaflow_domain::time::Timestamp;

use crate::api::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_CANCEL_REASON: &str = "canceled by user";

/// Request body for cancelling an execution.
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// Outcome reported by a worker for one execution.
#[derive(Debug, Deserialize)]
pub struct ResultRequest {
    pub status: ExecutionStatus,
    #[serde(default)]
    pub output: Option<Payload>,
    #[serde(default)]
    pub error: Option<Payload>,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub finished_at: Option<Timestamp>,
}

impl ResultRequest {
    fn into_result(self, execution_id: ExecutionId) -> ExecutionResult {
        ExecutionResult {
            output: self.output,
            error: self.error,
            started_at: self.started_at,
            finished_at: self.finished_at,
            ..ExecutionResult::new(execution_id, self.status)
        }
    }
}

/// Follow-up executions started by a successful result.
#[derive(Debug, Default, Serialize)]
pub struct ChainSummary {
    pub dispatched: Vec<ExecutionId>,
    pub skipped: Vec<ActionInstanceId>,
    pub failed: Vec<ActionInstanceId>,
    pub halted: bool,
}

impl From<ChainOutcome> for ChainSummary {
    fn from(outcome: ChainOutcome) -> Self {
        Self {
            dispatched: outcome.dispatched.iter().map(|e| e.id).collect(),
            skipped: outcome.skipped,
            failed: outcome.failed,
            halted: outcome.halted,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultBody {
    pub execution: Execution,
    /// Absent unless the chain was walked.
    pub chain: Option<ChainSummary>,
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<Execution>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the stats endpoint.
pub enum StatsResponse {
    Ok(Json<ExecutionStatistics>),
}

impl IntoResponse for StatsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the result endpoint.
pub enum ResultResponse {
    Ok(Json<ResultBody>),
}

impl IntoResponse for ResultResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/executions/{id}`
pub async fn get<R, D, S, IR, AR, MR, LR>(
    State(state): State<AppState<R, D, S, IR, AR, MR, LR>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    R: ExecutionRepository + Send + Sync + 'static,
    D: Dispatcher + Send + Sync + 'static,
    S: DedupStore + Send + Sync + 'static,
    IR: ActionInstanceRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    MR: ActivationModeRepository + Send + Sync + 'static,
    LR: ActionLinkRepository + Send + Sync + 'static,
{
    let id: ExecutionId = parse_id("Execution", &id)?;
    let execution = state.executions.get(id).await?;
    Ok(GetResponse::Ok(Json(execution)))
}

/// `GET /api/executions/stats`
pub async fn stats<R, D, S, IR, AR, MR, LR>(
    State(state): State<AppState<R, D, S, IR, AR, MR, LR>>,
) -> Result<StatsResponse, ApiError>
where
    R: ExecutionRepository + Send + Sync + 'static,
    D: Dispatcher + Send + Sync + 'static,
    S: DedupStore + Send + Sync + 'static,
    IR: ActionInstanceRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    MR: ActivationModeRepository + Send + Sync + 'static,
    LR: ActionLinkRepository + Send + Sync + 'static,
{
    let statistics = state.executions.statistics().await?;
    Ok(StatsResponse::Ok(Json(statistics)))
}

/// `POST /api/executions/{id}/cancel`
pub async fn cancel<R, D, S, IR, AR, MR, LR>(
    State(state): State<AppState<R, D, S, IR, AR, MR, LR>>,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<GetResponse, ApiError>
where
    R: ExecutionRepository + Send + Sync + 'static,
    D: Dispatcher + Send + Sync + 'static,
    S: DedupStore + Send + Sync + 'static,
    IR: ActionInstanceRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    MR: ActivationModeRepository + Send + Sync + 'static,
    LR: ActionLinkRepository + Send + Sync + 'static,
{
    let id: ExecutionId = parse_id("Execution", &id)?;
    let reason = body
        .and_then(|Json(request)| request.reason)
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
    let execution = state.executions.cancel(id, &reason).await?;
    Ok(GetResponse::Ok(Json(execution)))
}

/// `POST /api/executions/{id}/result`
///
/// Records a worker outcome. An `OK` trigger continues the area's chain when
/// the area has a `CHAIN` activation; chain failures are logged and leave the
/// recorded result in place.
pub async fn report_result<R, D, S, IR, AR, MR, LR>(
    State(state): State<AppState<R, D, S, IR, AR, MR, LR>>,
    Path(id): Path<String>,
    Json(request): Json<ResultRequest>,
) -> Result<ResultResponse, ApiError>
where
    R: ExecutionRepository + Send + Sync + 'static,
    D: Dispatcher + Send + Sync + 'static,
    S: DedupStore + Send + Sync + 'static,
    IR: ActionInstanceRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    MR: ActivationModeRepository + Send + Sync + 'static,
    LR: ActionLinkRepository + Send + Sync + 'static,
{
    let id: ExecutionId = parse_id("Execution", &id)?;
    let result = request.into_result(id);
    let execution = state.executions.record_result(result.clone()).await?;

    let chain = match state.chain.on_completion(&execution, &result).await {
        Ok(outcome) => outcome.map(ChainSummary::from),
        Err(err) => {
            tracing::warn!(execution_id = %execution.id, %err, "chain continuation failed");
            None
        }
    };

    Ok(ResultResponse::Ok(Json(ResultBody { execution, chain })))
}
