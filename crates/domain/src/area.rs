//! Area: a user-defined automation grouping triggers with reactions.

use serde::{Deserialize, Serialize};

use crate::error::{AreaflowError, ValidationError};
use crate::id::{AreaId, UserId};

/// Owner-scoped container of action instances; `enabled` gates all of its
/// activations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub user_id: UserId,
    pub name: String,
    pub enabled: bool,
}

impl Area {
    /// Create a builder for constructing an [`Area`].
    #[must_use]
    pub fn builder() -> AreaBuilder {
        AreaBuilder::default()
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
}

/// Step-by-step builder for [`Area`].
#[derive(Debug, Default)]
pub struct AreaBuilder {
    id: Option<AreaId>,
    user_id: Option<UserId>,
    name: Option<String>,
    enabled: Option<bool>,
}

impl AreaBuilder {
    #[must_use]
    pub fn id(mut self, id: AreaId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
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

    /// Consume the builder, validate, and return an [`Area`].
    ///
    /// # Errors
    ///
    /// Returns [`AreaflowError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Area, AreaflowError> {
        let area = Area {
            id: self.id.unwrap_or_default(),
            user_id: self.user_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
        };
        area.validate()?;
        Ok(area)
    }
}
