//! Typed identifier newtypes backed by UUIDs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an [`Area`](crate::area::Area).
    AreaId
);

define_id!(
    /// Unique identifier for an [`ActionInstance`](crate::action::ActionInstance).
    ActionInstanceId
);

define_id!(
    /// Unique identifier for an [`ActionDefinition`](crate::action::ActionDefinition).
    ActionDefinitionId
);

define_id!(
    /// Unique identifier for an [`ActivationMode`](crate::activation::ActivationMode).
    ActivationModeId
);

define_id!(
    /// Unique identifier for an [`ActionLink`](crate::action_link::ActionLink).
    ActionLinkId
);

define_id!(
    /// Unique identifier for an [`Execution`](crate::execution::Execution).
    ExecutionId
);

define_id!(
    /// Shared by every execution causally descended from one originating trigger.
    CorrelationId
);

define_id!(
    /// Unique identifier for a published [`AreaEvent`](crate::event::AreaEvent).
    EventId
);

define_id!(
    /// Owner of areas and action instances.
    UserId
);

define_id!(
    /// Credentials binding used by executors when calling a third-party service.
    ServiceAccountId
);
