//! Router fixture backed by an in-memory `SQLite` database.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tower::ServiceExt;

use areaflow_adapter_storage_sqlite_sqlx::{
    Config, SqliteActionInstanceRepository, SqliteActionLinkRepository,
    SqliteActivationModeRepository, SqliteAreaRepository, SqliteExecutionRepository,
};
use areaflow_app::dedup_store::InMemoryDedupStore;
use areaflow_app::event_bus::InProcessEventBus;
use areaflow_app::ports::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
};
use areaflow_app::services::dedup_guard::DedupGuard;
use areaflow_app::services::dispatcher::TriggerDispatcher;
use areaflow_app::services::execution_service::ExecutionService;
use areaflow_app::services::reaction_chain::ReactionChainEngine;
use areaflow_app::services::trigger_intake::TriggerIntake;
use areaflow_domain::action::{ActionDefinition, ActionInstance};
use areaflow_domain::action_link::{ActionLink, LinkKind};
use areaflow_domain::activation::{ActivationKind, ActivationMode};
use areaflow_domain::area::Area;
use areaflow_domain::id::ActionLinkId;
use areaflow_domain::payload::Payload;
use areaflow_domain::time::now;

use crate::state::AppState;

pub(crate) type TestState = AppState<
    SqliteExecutionRepository,
    Arc<TriggerDispatcher<SqliteExecutionRepository, InProcessEventBus>>,
    InMemoryDedupStore,
    Arc<SqliteActionInstanceRepository>,
    Arc<SqliteAreaRepository>,
    Arc<SqliteActivationModeRepository>,
    Arc<SqliteActionLinkRepository>,
>;

pub(crate) struct Fixture {
    pub state: TestState,
    pub areas: Arc<SqliteAreaRepository>,
    pub instances: Arc<SqliteActionInstanceRepository>,
    pub modes: Arc<SqliteActivationModeRepository>,
    pub links: Arc<SqliteActionLinkRepository>,
}

pub(crate) async fn fixture() -> Fixture {
    let db = Config::in_memory().build().await.unwrap();
    let pool = db.pool().clone();

    let areas = Arc::new(SqliteAreaRepository::new(pool.clone()));
    let instances = Arc::new(SqliteActionInstanceRepository::new(pool.clone()));
    let modes = Arc::new(SqliteActivationModeRepository::new(pool.clone()));
    let links = Arc::new(SqliteActionLinkRepository::new(pool.clone()));
    let executions = Arc::new(ExecutionService::new(SqliteExecutionRepository::new(pool)));

    let bus = InProcessEventBus::new(16);
    let dispatcher = Arc::new(TriggerDispatcher::new(
        Arc::clone(&executions),
        bus.clone(),
    ));
    let intake = TriggerIntake::new(
        Arc::clone(&dispatcher),
        DedupGuard::new(InMemoryDedupStore::new()),
        Arc::clone(&instances),
        Arc::clone(&areas),
        Arc::clone(&modes),
    );
    let chain = ReactionChainEngine::new(
        dispatcher,
        Arc::clone(&areas),
        Arc::clone(&instances),
        Arc::clone(&modes),
        Arc::clone(&links),
    );

    Fixture {
        state: AppState::new(executions, Arc::new(intake), Arc::new(chain), bus),
        areas,
        instances,
        modes,
        links,
    }
}

impl Fixture {
    pub fn router(&self) -> Router {
        crate::router::build(self.state.clone())
    }

    /// Store an enabled area holding one instance.
    pub async fn seed_instance(&self, name: &str, key: &str, executable: bool) -> ActionInstance {
        let area = self
            .areas
            .create(Area::builder().name("ci").build().unwrap())
            .await
            .unwrap();
        self.seed_instance_in(&area, name, key, executable).await
    }

    pub async fn seed_instance_in(
        &self,
        area: &Area,
        name: &str,
        key: &str,
        executable: bool,
    ) -> ActionInstance {
        let instance = ActionInstance::builder()
            .area_id(area.id)
            .name(name)
            .definition(ActionDefinition::new(key, executable).unwrap())
            .build()
            .unwrap();
        self.instances.create(instance).await.unwrap()
    }
}

impl Fixture {
    /// Attach an enabled `CHAIN` activation to `instance`.
    pub async fn seed_chain_mode(&self, instance: &ActionInstance) -> ActivationMode {
        let mode = ActivationMode::builder()
            .action_instance_id(instance.id)
            .kind(ActivationKind::Chain)
            .build()
            .unwrap();
        self.modes.create(mode).await.unwrap()
    }

    pub async fn seed_link(&self, source: &ActionInstance, target: &ActionInstance) -> ActionLink {
        let link = ActionLink {
            id: ActionLinkId::new(),
            area_id: source.area_id,
            source_id: source.id,
            target_id: target.id,
            kind: LinkKind::Chain,
            mapping: Payload::new(),
            condition: None,
            order: 0,
            created_at: now(),
        };
        self.links.create(link).await.unwrap()
    }
}

pub(crate) async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.unwrap()
}

pub(crate) async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub(crate) fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
