//! In-memory fakes shared by the service tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use areaflow_domain::action::{ActionDefinition, ActionInstance};
use areaflow_domain::action_link::ActionLink;
use areaflow_domain::activation::{ActivationKind, ActivationMode};
use areaflow_domain::area::Area;
use areaflow_domain::error::{AreaflowError, NotFoundError};
use areaflow_domain::event::AreaEvent;
use areaflow_domain::execution::{Execution, ExecutionStatus};
use areaflow_domain::id::{
    ActionInstanceId, ActivationModeId, AreaId, CorrelationId, ExecutionId,
};
use areaflow_domain::time::Timestamp;

use crate::ports::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
    DedupStore, EventPublisher, ExecutionRepository, StatusCounts,
};
use crate::services::dispatcher::{Dispatch, Dispatcher};

#[derive(Debug)]
struct FakeError(&'static str);

impl std::fmt::Display for FakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for FakeError {}

/// Executable or trigger-only instance in a fresh area.
pub fn instance(name: &str, executable: bool) -> ActionInstance {
    instance_in(AreaId::new(), name, executable)
}

pub fn instance_in(area_id: AreaId, name: &str, executable: bool) -> ActionInstance {
    let key = if executable { "http.request" } else { "webhook.received" };
    ActionInstance::builder()
        .area_id(area_id)
        .name(name)
        .definition(ActionDefinition::new(key, executable).unwrap())
        .build()
        .unwrap()
}

pub fn area(name: &str) -> Area {
    Area::builder().name(name).build().unwrap()
}

// ── Executions ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryExecutions {
    store: Mutex<HashMap<ExecutionId, Execution>>,
}

impl InMemoryExecutions {
    fn select(&self, filter: impl Fn(&Execution) -> bool) -> Vec<Execution> {
        let store = self.store.lock().unwrap();
        let mut found: Vec<_> = store.values().filter(|e| filter(e)).cloned().collect();
        found.sort_by_key(|e| e.queued_at);
        found
    }
}

impl ExecutionRepository for InMemoryExecutions {
    async fn create(&self, execution: Execution) -> Result<Execution, AreaflowError> {
        self.store
            .lock()
            .unwrap()
            .insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn get_by_id(&self, id: ExecutionId) -> Result<Option<Execution>, AreaflowError> {
        Ok(self.store.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, execution: Execution) -> Result<Execution, AreaflowError> {
        let mut store = self.store.lock().unwrap();
        if !store.contains_key(&execution.id) {
            return Err(NotFoundError::new("Execution", execution.id).into());
        }
        store.insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn find_queued(&self) -> Result<Vec<Execution>, AreaflowError> {
        Ok(self.select(|e| e.status == ExecutionStatus::Queued))
    }

    async fn find_ready_for_retry(
        &self,
        threshold: Timestamp,
    ) -> Result<Vec<Execution>, AreaflowError> {
        Ok(self.select(|e| {
            e.status == ExecutionStatus::Retry && e.started_at.is_none_or(|at| at < threshold)
        }))
    }

    async fn find_timed_out(&self, threshold: Timestamp) -> Result<Vec<Execution>, AreaflowError> {
        Ok(self.select(|e| {
            e.status == ExecutionStatus::Running && e.started_at.is_some_and(|at| at < threshold)
        }))
    }

    async fn count_failed_since(
        &self,
        action_instance_id: ActionInstanceId,
        since: Timestamp,
    ) -> Result<u64, AreaflowError> {
        let failed = self.select(|e| {
            e.action_instance_id == action_instance_id
                && e.status == ExecutionStatus::Failed
                && e.queued_at > since
        });
        Ok(failed.len() as u64)
    }

    async fn count_by_status(&self) -> Result<StatusCounts, AreaflowError> {
        let mut counts = StatusCounts::new();
        for execution in self.store.lock().unwrap().values() {
            *counts.entry(execution.status).or_default() += 1;
        }
        Ok(counts)
    }

    async fn find_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<Execution>, AreaflowError> {
        Ok(self.select(|e| e.correlation_id == correlation_id))
    }
}

// ── Configuration ──────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryAreas {
    store: Mutex<HashMap<AreaId, Area>>,
}

impl AreaRepository for InMemoryAreas {
    async fn create(&self, area: Area) -> Result<Area, AreaflowError> {
        self.store.lock().unwrap().insert(area.id, area.clone());
        Ok(area)
    }

    async fn get_by_id(&self, id: AreaId) -> Result<Option<Area>, AreaflowError> {
        Ok(self.store.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, area: Area) -> Result<Area, AreaflowError> {
        self.store.lock().unwrap().insert(area.id, area.clone());
        Ok(area)
    }
}

#[derive(Default)]
pub struct InMemoryInstances {
    store: Mutex<Vec<ActionInstance>>,
}

impl ActionInstanceRepository for InMemoryInstances {
    async fn create(&self, instance: ActionInstance) -> Result<ActionInstance, AreaflowError> {
        self.store.lock().unwrap().push(instance.clone());
        Ok(instance)
    }

    async fn get_by_id(
        &self,
        id: ActionInstanceId,
    ) -> Result<Option<ActionInstance>, AreaflowError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn update(&self, instance: ActionInstance) -> Result<ActionInstance, AreaflowError> {
        let mut store = self.store.lock().unwrap();
        let slot = store
            .iter_mut()
            .find(|i| i.id == instance.id)
            .ok_or_else(|| NotFoundError::new("ActionInstance", instance.id))?;
        *slot = instance.clone();
        Ok(instance)
    }

    async fn find_enabled_by_area(
        &self,
        area_id: AreaId,
    ) -> Result<Vec<ActionInstance>, AreaflowError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.area_id == area_id && i.enabled)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryModes {
    store: Mutex<Vec<ActivationMode>>,
}

impl ActivationModeRepository for InMemoryModes {
    async fn create(&self, mode: ActivationMode) -> Result<ActivationMode, AreaflowError> {
        self.store.lock().unwrap().push(mode.clone());
        Ok(mode)
    }

    async fn get_by_id(
        &self,
        id: ActivationModeId,
    ) -> Result<Option<ActivationMode>, AreaflowError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn update(&self, mode: ActivationMode) -> Result<ActivationMode, AreaflowError> {
        let mut store = self.store.lock().unwrap();
        let slot = store
            .iter_mut()
            .find(|m| m.id == mode.id)
            .ok_or_else(|| NotFoundError::new("ActivationMode", mode.id))?;
        *slot = mode.clone();
        Ok(mode)
    }

    async fn find_enabled_by_kinds(
        &self,
        kinds: &[ActivationKind],
    ) -> Result<Vec<ActivationMode>, AreaflowError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.enabled && kinds.contains(&m.kind))
            .cloned()
            .collect())
    }

    async fn find_by_action_instance(
        &self,
        action_instance_id: ActionInstanceId,
    ) -> Result<Vec<ActivationMode>, AreaflowError> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.action_instance_id == action_instance_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryLinks {
    store: Mutex<Vec<ActionLink>>,
}

impl ActionLinkRepository for InMemoryLinks {
    async fn create(&self, link: ActionLink) -> Result<ActionLink, AreaflowError> {
        self.store.lock().unwrap().push(link.clone());
        Ok(link)
    }

    async fn find_by_source(
        &self,
        source_id: ActionInstanceId,
    ) -> Result<Vec<ActionLink>, AreaflowError> {
        let mut links: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.source_id == source_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.order);
        Ok(links)
    }
}

// ── Collaborators ──────────────────────────────────────────────────

/// Records published events; can be switched to fail every publish.
#[derive(Default)]
pub struct SpyPublisher {
    events: Mutex<Vec<AreaEvent>>,
    failing: AtomicBool,
}

impl SpyPublisher {
    pub fn failing() -> Self {
        let spy = Self::default();
        spy.failing.store(true, Ordering::SeqCst);
        spy
    }

    pub fn events(&self) -> Vec<AreaEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for SpyPublisher {
    async fn publish(&self, event: AreaEvent) -> Result<(), AreaflowError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AreaflowError::publish(FakeError("broker unavailable")));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Dedup store whose every call fails.
pub struct FailingDedupStore;

impl DedupStore for FailingDedupStore {
    async fn set_if_absent(&self, _key: &str, _ttl: Duration) -> Result<bool, AreaflowError> {
        Err(AreaflowError::storage(FakeError("store unreachable")))
    }

    async fn exists(&self, _key: &str) -> Result<bool, AreaflowError> {
        Err(AreaflowError::storage(FakeError("store unreachable")))
    }

    async fn remove(&self, _key: &str) -> Result<bool, AreaflowError> {
        Err(AreaflowError::storage(FakeError("store unreachable")))
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, AreaflowError> {
        Err(AreaflowError::storage(FakeError("store unreachable")))
    }

    async fn remove_prefix(&self, _prefix: &str) -> Result<u64, AreaflowError> {
        Err(AreaflowError::storage(FakeError("store unreachable")))
    }
}

/// One call received by [`SpyDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchCall {
    pub instance: ActionInstance,
    pub dispatch: Dispatch,
}

/// Records dispatch calls and fails for the instances it is told to.
#[derive(Default)]
pub struct SpyDispatcher {
    calls: Mutex<Vec<DispatchCall>>,
    failing: Mutex<HashSet<ActionInstanceId>>,
}

impl SpyDispatcher {
    pub fn fail_for(&self, id: ActionInstanceId) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn dispatched_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| call.instance.name)
            .collect()
    }
}

impl Dispatcher for SpyDispatcher {
    async fn dispatch(
        &self,
        instance: &ActionInstance,
        dispatch: Dispatch,
    ) -> Result<Execution, AreaflowError> {
        self.calls.lock().unwrap().push(DispatchCall {
            instance: instance.clone(),
            dispatch: dispatch.clone(),
        });
        if self.failing.lock().unwrap().contains(&instance.id) {
            return Err(AreaflowError::publish(FakeError("dispatch refused")));
        }
        let mut execution = Execution::queued(
            instance.id,
            Some(instance.area_id),
            dispatch.activation_mode_id,
            dispatch.input,
            dispatch.correlation_id,
        );
        execution.dedup_key = dispatch.dedup_key;
        Ok(execution)
    }
}
