//! Event bus port: hand-off point to the external worker pool.

use std::future::Future;

use areaflow_domain::error::AreaflowError;
use areaflow_domain::event::AreaEvent;

/// Publishes dispatched executions to whoever performs the actual work.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: AreaEvent) -> impl Future<Output = Result<(), AreaflowError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: AreaEvent) -> impl Future<Output = Result<(), AreaflowError>> + Send {
        (**self).publish(event)
    }
}
