//! Activation scheduler: owns one timer task per time-driven activation.
//!
//! Each task sleeps until the next occurrence of its schedule, reloads the
//! activation, its action instance and area, and dispatches when all three
//! are still enabled. The registry holds exactly one handle per activation
//! id; it is local to the process, so only one scheduler may run against a
//! given database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use areaflow_domain::activation::{ActivationKind, ActivationMode, ActivationSchedule};
use areaflow_domain::error::{AreaflowError, ValidationError};
use areaflow_domain::execution::Execution;
use areaflow_domain::id::{ActivationModeId, CorrelationId};
use areaflow_domain::payload::{Payload, Value};
use areaflow_domain::time::{self, Timestamp};

use crate::ports::{ActionInstanceRepository, ActivationModeRepository, AreaRepository};
use crate::services::dispatcher::{Dispatch, Dispatcher};

/// Result of [`ActivationScheduler::init`].
#[derive(Debug, Default)]
pub struct ScheduleReport {
    pub scheduled: Vec<ActivationModeId>,
    /// Activations that could not be armed, with the reason.
    pub failed: Vec<(ActivationModeId, String)>,
}

struct Shared<D, MR, IR, AR> {
    dispatcher: D,
    modes: MR,
    instances: IR,
    areas: AR,
}

impl<D, MR, IR, AR> Shared<D, MR, IR, AR>
where
    D: Dispatcher + Send + Sync,
    MR: ActivationModeRepository + Send + Sync,
    IR: ActionInstanceRepository + Send + Sync,
    AR: AreaRepository + Send + Sync,
{
    async fn fire(&self, mode_id: ActivationModeId, schedule: &ActivationSchedule) {
        match self.try_fire(mode_id, schedule).await {
            Ok(Some(execution)) => {
                tracing::info!(%mode_id, execution_id = %execution.id, "scheduled activation fired");
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(%mode_id, %err, "scheduled activation failed to dispatch");
            }
        }
    }

    async fn try_fire(
        &self,
        mode_id: ActivationModeId,
        schedule: &ActivationSchedule,
    ) -> Result<Option<Execution>, AreaflowError> {
        let Some(mode) = self.modes.get_by_id(mode_id).await?.filter(|m| m.enabled) else {
            tracing::debug!(%mode_id, "activation missing or disabled, tick skipped");
            return Ok(None);
        };
        let Some(instance) = self
            .instances
            .get_by_id(mode.action_instance_id)
            .await?
            .filter(|i| i.enabled)
        else {
            tracing::debug!(%mode_id, "action instance missing or disabled, tick skipped");
            return Ok(None);
        };
        let area = self.areas.get_by_id(instance.area_id).await?;
        if !area.is_some_and(|area| area.enabled) {
            tracing::debug!(%mode_id, "area missing or disabled, tick skipped");
            return Ok(None);
        }

        let dispatch = Dispatch::new(mode.kind, fire_payload(mode.id, schedule), CorrelationId::new())
            .activation_mode(mode.id);
        self.dispatcher.dispatch(&instance, dispatch).await.map(Some)
    }
}

fn fire_payload(mode_id: ActivationModeId, schedule: &ActivationSchedule) -> Payload {
    let mut payload = Payload::from([
        ("triggered_by".to_string(), Value::from(schedule.label())),
        (
            "execution_time".to_string(),
            Value::from(time::now().to_rfc3339()),
        ),
        (
            "activation_mode_id".to_string(),
            Value::from(mode_id.to_string()),
        ),
    ]);
    schedule.annotate(&mut payload);
    payload
}

/// Self re-arming timer of one activation.
struct ActivationTimer<D, MR, IR, AR> {
    shared: Arc<Shared<D, MR, IR, AR>>,
    mode_id: ActivationModeId,
    schedule: ActivationSchedule,
}

impl<D, MR, IR, AR> ActivationTimer<D, MR, IR, AR>
where
    D: Dispatcher + Send + Sync,
    MR: ActivationModeRepository + Send + Sync,
    IR: ActionInstanceRepository + Send + Sync,
    AR: AreaRepository + Send + Sync,
{
    async fn run(self) {
        let mut last_fire: Option<Timestamp> = None;
        loop {
            let delay = match &self.schedule {
                // measured from the completion of the previous tick
                ActivationSchedule::Interval(period) => *period,
                ActivationSchedule::Cron { .. } => {
                    let now = time::now();
                    let anchor = last_fire.map_or(now, |last| last.max(now));
                    let Some(next) = self.schedule.next_after(anchor) else {
                        tracing::info!(mode_id = %self.mode_id, "schedule has no further occurrence");
                        return;
                    };
                    last_fire = Some(next);
                    time::delay_until(now, next)
                }
            };
            tokio::time::sleep(delay).await;
            self.shared.fire(self.mode_id, &self.schedule).await;
        }
    }
}

/// Arms and tracks timers for `TIME_SCHEDULE` and `POLL` activations.
pub struct ActivationScheduler<D, MR, IR, AR> {
    shared: Arc<Shared<D, MR, IR, AR>>,
    tasks: Mutex<HashMap<ActivationModeId, JoinHandle<()>>>,
}

impl<D, MR, IR, AR> ActivationScheduler<D, MR, IR, AR>
where
    D: Dispatcher + Send + Sync + 'static,
    MR: ActivationModeRepository + Send + Sync + 'static,
    IR: ActionInstanceRepository + Send + Sync + 'static,
    AR: AreaRepository + Send + Sync + 'static,
{
    pub fn new(dispatcher: D, modes: MR, instances: IR, areas: AR) -> Self {
        Self {
            shared: Arc::new(Shared {
                dispatcher,
                modes,
                instances,
                areas,
            }),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<ActivationModeId, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the timer of `mode`, replacing any timer already armed for it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::Validation`] when the kind is not time driven
    /// or the schedule config is invalid; the registry is left untouched.
    pub fn schedule(&self, mode: &ActivationMode) -> Result<(), AreaflowError> {
        if !mode.kind.is_time_driven() {
            return Err(ValidationError::NotTimeDriven(mode.kind.as_str().to_string()).into());
        }
        let schedule = mode.schedule()?;
        tracing::info!(
            mode_id = %mode.id,
            kind = %mode.kind,
            schedule = schedule.label(),
            "activation scheduled"
        );

        let timer = ActivationTimer {
            shared: Arc::clone(&self.shared),
            mode_id: mode.id,
            schedule,
        };
        let handle = tokio::spawn(timer.run());
        if let Some(previous) = self.lock_tasks().insert(mode.id, handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Stop the timer of an activation; returns whether one was armed.
    pub fn cancel(&self, mode_id: ActivationModeId) -> bool {
        let Some(handle) = self.lock_tasks().remove(&mode_id) else {
            return false;
        };
        handle.abort();
        tracing::info!(%mode_id, "activation unscheduled");
        true
    }

    /// Cancel, then arm again when `mode` is enabled. Returns whether a
    /// timer is armed afterwards.
    ///
    /// # Errors
    ///
    /// Same as [`schedule`](Self::schedule).
    pub fn reschedule(&self, mode: &ActivationMode) -> Result<bool, AreaflowError> {
        self.cancel(mode.id);
        if !mode.enabled {
            return Ok(false);
        }
        self.schedule(mode)?;
        Ok(true)
    }

    /// Arm every enabled time-driven activation. One invalid activation
    /// does not prevent the others from being armed.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the activations cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn init(&self) -> Result<ScheduleReport, AreaflowError> {
        let modes = self
            .shared
            .modes
            .find_enabled_by_kinds(&ActivationKind::TIME_DRIVEN)
            .await?;
        let mut report = ScheduleReport::default();
        for mode in modes {
            match self.schedule(&mode) {
                Ok(()) => report.scheduled.push(mode.id),
                Err(err) => {
                    tracing::warn!(mode_id = %mode.id, %err, "activation could not be scheduled");
                    report.failed.push((mode.id, err.to_string()));
                }
            }
        }
        tracing::info!(
            scheduled = report.scheduled.len(),
            failed = report.failed.len(),
            "scheduler initialised"
        );
        Ok(report)
    }

    /// Drop every timer and arm again from storage.
    ///
    /// # Errors
    ///
    /// Same as [`init`](Self::init).
    pub async fn reload(&self) -> Result<ScheduleReport, AreaflowError> {
        self.shutdown();
        self.init().await
    }

    /// Number of timers still running.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock_tasks()
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Whether each registered timer is still running.
    #[must_use]
    pub fn status(&self) -> HashMap<ActivationModeId, bool> {
        self.lock_tasks()
            .iter()
            .map(|(id, handle)| (*id, !handle.is_finished()))
            .collect()
    }

    /// Abort every timer.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.lock_tasks().drain().collect();
        for (_, handle) in &drained {
            handle.abort();
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "scheduler stopped");
        }
    }
}

impl<D, MR, IR, AR> Drop for ActivationScheduler<D, MR, IR, AR> {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}
