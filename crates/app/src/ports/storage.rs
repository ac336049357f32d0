//! Storage ports for the configuration side of the model: areas, action
//! instances, activation modes and action links.
//!
//! Full CRUD for these entities lives outside this core; the ports expose
//! what the orchestration services read, plus the writes needed to seed them.

use std::future::Future;
use std::sync::Arc;

use areaflow_domain::action::ActionInstance;
use areaflow_domain::action_link::ActionLink;
use areaflow_domain::activation::{ActivationKind, ActivationMode};
use areaflow_domain::area::Area;
use areaflow_domain::error::AreaflowError;
use areaflow_domain::id::{ActionInstanceId, ActivationModeId, AreaId};

/// Repository for [`Area`]s.
pub trait AreaRepository {
    fn create(&self, area: Area) -> impl Future<Output = Result<Area, AreaflowError>> + Send;

    fn get_by_id(
        &self,
        id: AreaId,
    ) -> impl Future<Output = Result<Option<Area>, AreaflowError>> + Send;

    fn update(&self, area: Area) -> impl Future<Output = Result<Area, AreaflowError>> + Send;
}

/// Repository for [`ActionInstance`]s.
pub trait ActionInstanceRepository {
    fn create(
        &self,
        instance: ActionInstance,
    ) -> impl Future<Output = Result<ActionInstance, AreaflowError>> + Send;

    fn get_by_id(
        &self,
        id: ActionInstanceId,
    ) -> impl Future<Output = Result<Option<ActionInstance>, AreaflowError>> + Send;

    fn update(
        &self,
        instance: ActionInstance,
    ) -> impl Future<Output = Result<ActionInstance, AreaflowError>> + Send;

    /// Enabled instances of an area, in creation order.
    fn find_enabled_by_area(
        &self,
        area_id: AreaId,
    ) -> impl Future<Output = Result<Vec<ActionInstance>, AreaflowError>> + Send;
}

/// Repository for [`ActivationMode`]s.
pub trait ActivationModeRepository {
    fn create(
        &self,
        mode: ActivationMode,
    ) -> impl Future<Output = Result<ActivationMode, AreaflowError>> + Send;

    fn get_by_id(
        &self,
        id: ActivationModeId,
    ) -> impl Future<Output = Result<Option<ActivationMode>, AreaflowError>> + Send;

    fn update(
        &self,
        mode: ActivationMode,
    ) -> impl Future<Output = Result<ActivationMode, AreaflowError>> + Send;

    /// Enabled activations whose kind is one of `kinds`.
    fn find_enabled_by_kinds(
        &self,
        kinds: &[ActivationKind],
    ) -> impl Future<Output = Result<Vec<ActivationMode>, AreaflowError>> + Send;

    /// Every activation attached to an action instance.
    fn find_by_action_instance(
        &self,
        action_instance_id: ActionInstanceId,
    ) -> impl Future<Output = Result<Vec<ActivationMode>, AreaflowError>> + Send;
}

/// Repository for [`ActionLink`]s.
pub trait ActionLinkRepository {
    fn create(
        &self,
        link: ActionLink,
    ) -> impl Future<Output = Result<ActionLink, AreaflowError>> + Send;

    /// Links leaving `source_id`, lowest `order` first.
    fn find_by_source(
        &self,
        source_id: ActionInstanceId,
    ) -> impl Future<Output = Result<Vec<ActionLink>, AreaflowError>> + Send;
}

impl<T: AreaRepository + Send + Sync> AreaRepository for Arc<T> {
    fn create(&self, area: Area) -> impl Future<Output = Result<Area, AreaflowError>> + Send {
        (**self).create(area)
    }

    fn get_by_id(
        &self,
        id: AreaId,
    ) -> impl Future<Output = Result<Option<Area>, AreaflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn update(&self, area: Area) -> impl Future<Output = Result<Area, AreaflowError>> + Send {
        (**self).update(area)
    }
}

impl<T: ActionInstanceRepository + Send + Sync> ActionInstanceRepository for Arc<T> {
    fn create(
        &self,
        instance: ActionInstance,
    ) -> impl Future<Output = Result<ActionInstance, AreaflowError>> + Send {
        (**self).create(instance)
    }

    fn get_by_id(
        &self,
        id: ActionInstanceId,
    ) -> impl Future<Output = Result<Option<ActionInstance>, AreaflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn update(
        &self,
        instance: ActionInstance,
    ) -> impl Future<Output = Result<ActionInstance, AreaflowError>> + Send {
        (**self).update(instance)
    }

    fn find_enabled_by_area(
        &self,
        area_id: AreaId,
    ) -> impl Future<Output = Result<Vec<ActionInstance>, AreaflowError>> + Send {
        (**self).find_enabled_by_area(area_id)
    }
}

impl<T: ActivationModeRepository + Send + Sync> ActivationModeRepository for Arc<T> {
    fn create(
        &self,
        mode: ActivationMode,
    ) -> impl Future<Output = Result<ActivationMode, AreaflowError>> + Send {
        (**self).create(mode)
    }

    fn get_by_id(
        &self,
        id: ActivationModeId,
    ) -> impl Future<Output = Result<Option<ActivationMode>, AreaflowError>> + Send {
        (**self).get_by_id(id)
    }

    fn update(
        &self,
        mode: ActivationMode,
    ) -> impl Future<Output = Result<ActivationMode, AreaflowError>> + Send {
        (**self).update(mode)
    }

    fn find_enabled_by_kinds(
        &self,
        kinds: &[ActivationKind],
    ) -> impl Future<Output = Result<Vec<ActivationMode>, AreaflowError>> + Send {
        (**self).find_enabled_by_kinds(kinds)
    }

    fn find_by_action_instance(
        &self,
        action_instance_id: ActionInstanceId,
    ) -> impl Future<Output = Result<Vec<ActivationMode>, AreaflowError>> + Send {
        (**self).find_by_action_instance(action_instance_id)
    }
}

impl<T: ActionLinkRepository + Send + Sync> ActionLinkRepository for Arc<T> {
    fn create(
        &self,
        link: ActionLink,
    ) -> impl Future<Output = Result<ActionLink, AreaflowError>> + Send {
        (**self).create(link)
    }

    fn find_by_source(
        &self,
        source_id: ActionInstanceId,
    ) -> impl Future<Output = Result<Vec<ActionLink>, AreaflowError>> + Send {
        (**self).find_by_source(source_id)
    }
}
