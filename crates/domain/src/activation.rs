//! ActivationMode: how a trigger action instance starts an execution.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AreaflowError, ValidationError};
use crate::id::{ActionInstanceId, ActivationModeId};
use crate::payload::{Payload, Value};
use crate::time::{Timestamp, now};

/// Config key holding the cron expression of a `TIME_SCHEDULE` activation.
pub const SCHEDULE_EXPRESSION_KEY: &str = "schedule_expression";
/// Legacy spelling accepted when [`SCHEDULE_EXPRESSION_KEY`] is absent.
pub const LEGACY_CRON_EXPRESSION_KEY: &str = "cron_expression";
/// Config key holding the period of a `POLL` activation.
pub const INTERVAL_SECONDS_KEY: &str = "interval_seconds";
/// Poll period used when the config has no [`INTERVAL_SECONDS_KEY`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Mechanism by which an activation fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationKind {
    TimeSchedule,
    Webhook,
    Poll,
    Manual,
    Chain,
}

impl ActivationKind {
    pub const ALL: [Self; 5] = [
        Self::TimeSchedule,
        Self::Webhook,
        Self::Poll,
        Self::Manual,
        Self::Chain,
    ];

    /// Kinds owned by the activation scheduler.
    pub const TIME_DRIVEN: [Self; 2] = [Self::TimeSchedule, Self::Poll];

    #[must_use]
    pub fn is_time_driven(self) -> bool {
        Self::TIME_DRIVEN.contains(&self)
    }

    /// Persisted and enumerated name, e.g. `TIME_SCHEDULE`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TimeSchedule => "TIME_SCHEDULE",
            Self::Webhook => "WEBHOOK",
            Self::Poll => "POLL",
            Self::Manual => "MANUAL",
            Self::Chain => "CHAIN",
        }
    }

    /// Lowercase tag carried by published events, e.g. `time_schedule`.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::TimeSchedule => "time_schedule",
            Self::Webhook => "webhook",
            Self::Poll => "poll",
            Self::Manual => "manual",
            Self::Chain => "chain",
        }
    }
}

impl fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownVariant {
                entity: "activation kind",
                value: s.to_string(),
            })
    }
}

/// How redelivered inbound events are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DedupStrategy {
    #[default]
    None,
    ByExternalId,
    ByPayloadHash,
}

impl DedupStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::ByExternalId => "BY_EXTERNAL_ID",
            Self::ByPayloadHash => "BY_PAYLOAD_HASH",
        }
    }
}

impl FromStr for DedupStrategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::None, Self::ByExternalId, Self::ByPayloadHash]
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownVariant {
                entity: "dedup strategy",
                value: s.to_string(),
            })
    }
}

/// A configured activation of a trigger action instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationMode {
    pub id: ActivationModeId,
    pub action_instance_id: ActionInstanceId,
    pub kind: ActivationKind,
    pub config: Payload,
    pub enabled: bool,
    pub dedup: DedupStrategy,
    pub max_concurrency: Option<u32>,
    pub rate_limit: Option<Payload>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ActivationMode {
    /// Create a builder for constructing an [`ActivationMode`].
    #[must_use]
    pub fn builder() -> ActivationModeBuilder {
        ActivationModeBuilder::default()
    }

    /// Resolve the timing rule of a time-driven activation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotTimeDriven`] for webhook, manual and chain
    /// activations, and a schedule error when the config is missing or malformed.
    pub fn schedule(&self) -> Result<ActivationSchedule, ValidationError> {
        match self.kind {
            ActivationKind::TimeSchedule => {
                let expression = self
                    .config
                    .get(SCHEDULE_EXPRESSION_KEY)
                    .or_else(|| self.config.get(LEGACY_CRON_EXPRESSION_KEY))
                    .and_then(Value::as_str)
                    .filter(|expr| !expr.trim().is_empty())
                    .ok_or(ValidationError::MissingScheduleField {
                        kind: ActivationKind::TimeSchedule.as_str(),
                        field: SCHEDULE_EXPRESSION_KEY,
                    })?;
                ActivationSchedule::cron(expression)
            }
            ActivationKind::Poll => match self.config.get(INTERVAL_SECONDS_KEY) {
                None | Some(Value::Null) => Ok(ActivationSchedule::Interval(DEFAULT_POLL_INTERVAL)),
                Some(raw) => {
                    let secs = raw.as_i64().ok_or(ValidationError::MissingScheduleField {
                        kind: ActivationKind::Poll.as_str(),
                        field: INTERVAL_SECONDS_KEY,
                    })?;
                    let secs = u64::try_from(secs)
                        .ok()
                        .filter(|s| *s > 0)
                        .ok_or(ValidationError::InvalidInterval(secs))?;
                    Ok(ActivationSchedule::Interval(Duration::from_secs(secs)))
                }
            },
            other => Err(ValidationError::NotTimeDriven(other.as_str().to_string())),
        }
    }
}

/// Parsed timing rule of a time-driven activation.
#[derive(Debug, Clone)]
pub enum ActivationSchedule {
    Cron {
        expression: String,
        schedule: Box<cron::Schedule>,
    },
    Interval(Duration),
}

impl ActivationSchedule {
    /// Parse a 6-field, seconds-resolution cron expression
    /// (`sec min hour day-of-month month day-of-week`).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSchedule`] on the wrong field count
    /// or when the expression is rejected by the parser.
    pub fn cron(expression: &str) -> Result<Self, ValidationError> {
        let expression = expression.trim();
        let fields = expression.split_whitespace().count();
        if fields != 6 {
            return Err(ValidationError::InvalidSchedule {
                expression: expression.to_string(),
                reason: format!("expected 6 fields, found {fields}"),
            });
        }
        let schedule =
            cron::Schedule::from_str(expression).map_err(|err| ValidationError::InvalidSchedule {
                expression: expression.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self::Cron {
            expression: expression.to_string(),
            schedule: Box::new(schedule),
        })
    }

    /// First fire instant strictly after `after`, `None` when a cron
    /// expression has no remaining occurrence.
    #[must_use]
    pub fn next_after(&self, after: Timestamp) -> Option<Timestamp> {
        match self {
            Self::Cron { schedule, .. } => schedule.after(&after).next(),
            Self::Interval(period) => chrono::Duration::from_std(*period)
                .ok()
                .and_then(|period| after.checked_add_signed(period)),
        }
    }

    /// Describe this schedule inside a fire payload.
    pub fn annotate(&self, payload: &mut Payload) {
        match self {
            Self::Cron { expression, .. } => {
                payload.insert(SCHEDULE_EXPRESSION_KEY.to_string(), Value::from(expression.as_str()));
            }
            Self::Interval(period) => {
                let secs = i64::try_from(period.as_secs()).unwrap_or(i64::MAX);
                payload.insert(INTERVAL_SECONDS_KEY.to_string(), Value::Int(secs));
            }
        }
    }

    /// Short label for logs and fire payloads.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cron { .. } => "cron",
            Self::Interval(_) => "poll",
        }
    }
}

/// Step-by-step builder for [`ActivationMode`].
#[derive(Debug, Default)]
pub struct ActivationModeBuilder {
    id: Option<ActivationModeId>,
    action_instance_id: Option<ActionInstanceId>,
    kind: Option<ActivationKind>,
    config: Payload,
    enabled: Option<bool>,
    dedup: DedupStrategy,
    max_concurrency: Option<u32>,
    rate_limit: Option<Payload>,
    created_at: Option<Timestamp>,
    updated_at: Option<Timestamp>,
}

impl ActivationModeBuilder {
    #[must_use]
    pub fn id(mut self, id: ActivationModeId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn action_instance_id(mut self, id: ActionInstanceId) -> Self {
        self.action_instance_id = Some(id);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: ActivationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn config(mut self, config: Payload) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn dedup(mut self, dedup: DedupStrategy) -> Self {
        self.dedup = dedup;
        self
    }

    #[must_use]
    pub fn max_concurrency(mut self, max: u32) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    #[must_use]
    pub fn rate_limit(mut self, rate_limit: Payload) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    #[must_use]
    pub fn updated_at(mut self, ts: Timestamp) -> Self {
        self.updated_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`ActivationMode`].
    ///
    /// Time-driven activations must carry a parseable schedule.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::Validation`] when the schedule config of a
    /// `TIME_SCHEDULE` or `POLL` activation is missing or malformed.
    pub fn build(self) -> Result<ActivationMode, AreaflowError> {
        let created_at = self.created_at.unwrap_or_else(now);
        let mode = ActivationMode {
            id: self.id.unwrap_or_default(),
            action_instance_id: self.action_instance_id.unwrap_or_default(),
            kind: self.kind.unwrap_or(ActivationKind::Manual),
            config: self.config,
            enabled: self.enabled.unwrap_or(true),
            dedup: self.dedup,
            max_concurrency: self.max_concurrency,
            rate_limit: self.rate_limit,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        };
        if mode.kind.is_time_driven() {
            mode.schedule()?;
        }
        Ok(mode)
    }
}
