//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use areaflow_app::ports::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
    DedupStore, ExecutionRepository,
};
use areaflow_app::services::dispatcher::Dispatcher;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Serves `/health` and nests the API under `/api`. Includes a
/// [`TraceLayer`] that logs each HTTP request/response at the `DEBUG` level.
pub fn build<R, D, S, IR, AR, MR, LR>(state: AppState<R, D, S, IR, AR, MR, LR>) -> Router
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
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;

    use crate::testing::{fixture, send};

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let fx = fixture().await;

        let response = send(
            fx.router(),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn should_return_404_for_unknown_route() {
        let fx = fixture().await;

        let response = send(
            fx.router(),
            Request::get("/api/nope").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
