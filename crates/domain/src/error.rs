//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`AreaflowError`] via `#[from]` or the boxed `Storage` / `Publish`
//! variants.

use crate::execution::ExecutionStatus;

/// Top-level error returned by domain validation and application services.
#[derive(Debug, thiserror::Error)]
pub enum AreaflowError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("storage failure")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("event publication failed")]
    Publish(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AreaflowError {
    /// Wrap any storage-layer error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }

    /// Wrap any event-bus error.
    pub fn publish(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Publish(Box::new(err))
    }
}

/// Invariant violations detected while building or mutating domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("action definition key must not be empty")]
    EmptyDefinitionKey,

    #[error("{kind} activation requires a `{field}` entry in its config")]
    MissingScheduleField { kind: &'static str, field: &'static str },

    #[error("invalid schedule expression {expression:?}: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("poll interval must be a positive number of seconds, got {0}")]
    InvalidInterval(i64),

    #[error("{0} activations are not time driven")]
    NotTimeDriven(String),

    #[error("execution cannot move from {from} to {to}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("unknown {entity} value {value:?}")]
    UnknownVariant { entity: &'static str, value: String },
}

/// A lookup by id that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

impl NotFoundError {
    #[must_use]
    pub fn new(entity: &'static str, id: impl ToString) -> Self {
        Self {
            entity,
            id: id.to_string(),
        }
    }
}
