//! # areaflowd: areaflow daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`areaflow.toml`, env vars) and initialise logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct application services, injecting repositories via port traits
//! - Arm the activation scheduler and start the execution sweeper
//! - Build the axum router, bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT); reload timers on SIGHUP
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use areaflow_adapter_http_axum::state::AppState;
use areaflow_adapter_storage_sqlite_sqlx::{
    SqliteActionInstanceRepository, SqliteActionLinkRepository, SqliteActivationModeRepository,
    SqliteAreaRepository, SqliteDedupStore, SqliteExecutionRepository,
};
use areaflow_app::activation_scheduler::ActivationScheduler;
use areaflow_app::event_bus::InProcessEventBus;
use areaflow_app::services::dedup_guard::DedupGuard;
use areaflow_app::services::dispatcher::TriggerDispatcher;
use areaflow_app::services::execution_service::ExecutionService;
use areaflow_app::services::execution_sweeper::ExecutionSweeper;
use areaflow_app::services::reaction_chain::ReactionChainEngine;
use areaflow_app::services::trigger_intake::TriggerIntake;

use crate::config::{Config, DedupConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = areaflow_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let areas = Arc::new(SqliteAreaRepository::new(pool.clone()));
    let instances = Arc::new(SqliteActionInstanceRepository::new(pool.clone()));
    let modes = Arc::new(SqliteActivationModeRepository::new(pool.clone()));
    let links = Arc::new(SqliteActionLinkRepository::new(pool.clone()));
    let dedup_store = Arc::new(SqliteDedupStore::new(pool.clone()));
    let executions = Arc::new(ExecutionService::new(SqliteExecutionRepository::new(pool)));

    // Event bus
    let event_bus = InProcessEventBus::new(config.event_bus.capacity);
    let event_log = spawn_event_log(&event_bus);

    // Services
    let dispatcher = Arc::new(TriggerDispatcher::new(
        Arc::clone(&executions),
        event_bus.clone(),
    ));
    let intake = TriggerIntake::new(
        Arc::clone(&dispatcher),
        dedup_guard(Arc::clone(&dedup_store), &config.dedup),
        Arc::clone(&instances),
        Arc::clone(&areas),
        Arc::clone(&modes),
    );
    let chain = ReactionChainEngine::new(
        Arc::clone(&dispatcher),
        Arc::clone(&areas),
        Arc::clone(&instances),
        Arc::clone(&modes),
        links,
    );

    // Scheduler
    let scheduler = Arc::new(ActivationScheduler::new(dispatcher, modes, instances, areas));
    if config.scheduler.enabled {
        let report = scheduler.init().await?;
        for (mode_id, reason) in &report.failed {
            tracing::warn!(%mode_id, %reason, "activation left unscheduled");
        }
    } else {
        tracing::info!("scheduler disabled");
    }

    // Maintenance
    let sweeper = ExecutionSweeper::new(
        Arc::clone(&executions),
        event_bus.clone(),
        config.executions.timeout(),
        config.executions.timeout_policy.into(),
        config.executions.retry,
    );
    let maintenance = spawn_maintenance(sweeper, dedup_store, config.executions.sweep_interval());

    // HTTP
    let state = AppState::new(executions, Arc::new(intake), Arc::new(chain), event_bus);
    let app = areaflow_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "areaflowd listening");

    let reload = spawn_reload_on_hangup(Arc::clone(&scheduler), config.scheduler.enabled);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reload.abort();
    maintenance.abort();
    event_log.abort();
    scheduler.shutdown();
    tracing::info!("areaflowd stopped");
    Ok(())
}

fn dedup_guard<S>(store: S, config: &DedupConfig) -> DedupGuard<S>
where
    S: areaflow_app::ports::DedupStore,
{
    let mut guard = DedupGuard::new(store);
    if let Some(secs) = config.default_ttl_secs {
        guard = guard.with_default_ttl(Duration::from_secs(secs));
    }
    for (provider, secs) in &config.providers {
        guard = guard.with_provider_ttl(provider, Duration::from_secs(*secs));
    }
    guard
}

/// Log every published event at `DEBUG`.
fn spawn_event_log(bus: &InProcessEventBus) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(
                    event_id = %event.id,
                    execution_id = %event.execution_id,
                    event_type = %event.event_type,
                    correlation_id = %event.correlation_id,
                    "event published"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event log lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Periodically resolve timed-out and retryable executions and drop expired
/// dedup keys.
fn spawn_maintenance(
    sweeper: ExecutionSweeper<SqliteExecutionRepository, InProcessEventBus>,
    dedup_store: Arc<SqliteDedupStore>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = sweeper.sweep().await {
                tracing::error!(%err, "execution sweep failed");
            }
            match dedup_store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "expired dedup keys purged"),
                Err(err) => tracing::warn!(%err, "dedup purge failed"),
            }
        }
    })
}

type Scheduler = ActivationScheduler<
    Arc<TriggerDispatcher<SqliteExecutionRepository, InProcessEventBus>>,
    Arc<SqliteActivationModeRepository>,
    Arc<SqliteActionInstanceRepository>,
    Arc<SqliteAreaRepository>,
>;

#[cfg(unix)]
fn spawn_reload_on_hangup(scheduler: Arc<Scheduler>, enabled: bool) -> JoinHandle<()> {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(err) => {
                tracing::warn!(%err, "SIGHUP handler unavailable");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            if !enabled {
                continue;
            }
            match scheduler.reload().await {
                Ok(report) => tracing::info!(
                    scheduled = report.scheduled.len(),
                    failed = report.failed.len(),
                    "activations reloaded"
                ),
                Err(err) => tracing::error!(%err, "activation reload failed"),
            }
        }
    })
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_scheduler: Arc<Scheduler>, _enabled: bool) -> JoinHandle<()> {
    tokio::spawn(async {})
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                tracing::warn!(%err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested");
}
