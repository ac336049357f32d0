//! Action definitions and their configured instances inside an area.

use serde::{Deserialize, Serialize};

use crate::error::{AreaflowError, ValidationError};
use crate::id::{ActionDefinitionId, ActionInstanceId, AreaId, ServiceAccountId, UserId};
use crate::payload::{Payload, Value};

/// Catalogue entry for something a service can do, e.g. `github.create_issue`.
///
/// Trigger-only definitions (`executable == false`) can start a chain but are
/// never dispatched as reactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub id: ActionDefinitionId,
    pub key: String,
    pub executable: bool,
}

impl ActionDefinition {
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyDefinitionKey`] when `key` is blank.
    pub fn new(key: impl Into<String>, executable: bool) -> Result<Self, AreaflowError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ValidationError::EmptyDefinitionKey.into());
        }
        Ok(Self {
            id: ActionDefinitionId::new(),
            key,
            executable,
        })
    }
}

/// A configured use of an [`ActionDefinition`] within an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInstance {
    pub id: ActionInstanceId,
    pub user_id: UserId,
    pub area_id: AreaId,
    pub definition: ActionDefinition,
    pub service_account_id: Option<ServiceAccountId>,
    pub name: String,
    pub enabled: bool,
    pub params: Payload,
}

impl ActionInstance {
    /// Create a builder for constructing an [`ActionInstance`].
    #[must_use]
    pub fn builder() -> ActionInstanceBuilder {
        ActionInstanceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), AreaflowError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Whether this instance can be dispatched as a reaction.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.definition.executable
    }

    /// Chain-related parameters read from [`params`](Self::params).
    #[must_use]
    pub fn reaction_params(&self) -> ReactionParams {
        ReactionParams::from_params(&self.params)
    }
}

/// Chain step settings carried in an action instance's parameter payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionParams {
    pub order: i64,
    pub mapping: Option<Payload>,
    pub condition: Option<Value>,
    pub continue_on_error: bool,
}

impl Default for ReactionParams {
    fn default() -> Self {
        Self {
            order: 0,
            mapping: None,
            condition: None,
            continue_on_error: true,
        }
    }
}

impl ReactionParams {
    /// Read `order` (default 0), `mapping`, `condition` and
    /// `continue_on_error` (default true). Mistyped entries use the default.
    #[must_use]
    pub fn from_params(params: &Payload) -> Self {
        let defaults = Self::default();
        Self {
            order: params
                .get("order")
                .and_then(Value::as_i64)
                .unwrap_or(defaults.order),
            mapping: params
                .get("mapping")
                .and_then(Value::as_object)
                .filter(|m| !m.is_empty())
                .cloned(),
            condition: params.get("condition").filter(|c| !c.is_null()).cloned(),
            continue_on_error: params
                .get("continue_on_error")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.continue_on_error),
        }
    }
}

/// Step-by-step builder for [`ActionInstance`].
#[derive(Debug, Default)]
pub struct ActionInstanceBuilder {
    id: Option<ActionInstanceId>,
    user_id: Option<UserId>,
    area_id: Option<AreaId>,
    definition: Option<ActionDefinition>,
    service_account_id: Option<ServiceAccountId>,
    name: Option<String>,
    enabled: Option<bool>,
    params: Payload,
}

impl ActionInstanceBuilder {
    #[must_use]
    pub fn id(mut self, id: ActionInstanceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn area_id(mut self, area_id: AreaId) -> Self {
        self.area_id = Some(area_id);
        self
    }

    #[must_use]
    pub fn definition(mut self, definition: ActionDefinition) -> Self {
        self.definition = Some(definition);
        self
    }

    #[must_use]
    pub fn service_account_id(mut self, id: ServiceAccountId) -> Self {
        self.service_account_id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn params(mut self, params: Payload) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Consume the builder, validate, and return an [`ActionInstance`].
    ///
    /// Without an explicit definition the instance is bound to a
    /// trigger-only `manual` definition.
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<ActionInstance, AreaflowError> {
        let definition = match self.definition {
            Some(definition) => definition,
            None => ActionDefinition::new("manual", false)?,
        };
        let instance = ActionInstance {
            id: self.id.unwrap_or_default(),
            user_id: self.user_id.unwrap_or_default(),
            area_id: self.area_id.unwrap_or_default(),
            definition,
            service_account_id: self.service_account_id,
            name: self.name.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            params: self.params,
        };
        instance.validate()?;
        Ok(instance)
    }
}
