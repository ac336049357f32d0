//! Server-Sent Events (SSE) stream of dispatched executions.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use areaflow_app::ports::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
    DedupStore, ExecutionRepository,
};
use areaflow_app::services::dispatcher::Dispatcher;

use crate::state::AppState;

/// `GET /api/events/stream`: one SSE frame per published [`AreaEvent`].
///
/// Frames are named after the event type (`webhook`, `cron`, `manual`, ...)
/// and carry the JSON-encoded event. The stream ends when the client
/// disconnects or the bus is closed.
///
/// [`AreaEvent`]: areaflow_domain::event::AreaEvent
pub async fn stream<R, D, S, IR, AR, MR, LR>(
    State(state): State<AppState<R, D, S, IR, AR, MR, LR>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>
where
    R: ExecutionRepository + Send + Sync + 'static,
    D: Dispatcher + Send + Sync + 'static,
    S: DedupStore + Send + Sync + 'static,
    IR: ActionInstanceRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
    MR: ActivationModeRepository + Send + Sync + 'static,
    LR: ActionLinkRepository + Send + Sync + 'static,
{
    let receiver = state.event_bus.subscribe();
    let events = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().event(&event.event_type).data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to encode event for SSE stream");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber lagged, events dropped");
            None
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
