//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use areaflow_domain::error::AreaflowError;
use areaflow_domain::event::AreaEvent;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<AreaEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AreaEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: AreaEvent) -> impl Future<Output = Result<(), AreaflowError>> + Send {
        // only fails with zero receivers
        if self.sender.send(event).is_err() {
            tracing::trace!("event published with no subscriber");
        }
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use areaflow_domain::activation::ActivationKind;
    use areaflow_domain::execution::Execution;
    use areaflow_domain::id::{ActionInstanceId, CorrelationId};
    use areaflow_domain::payload::Payload;

    fn event() -> AreaEvent {
        let execution = Execution::queued(
            ActionInstanceId::new(),
            None,
            None,
            Payload::new(),
            CorrelationId::new(),
        );
        AreaEvent::for_execution(&execution, ActivationKind::Manual)
    }

    #[tokio::test]
    async fn should_deliver_event_to_every_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = event();
        let event_id = event.id;
        bus.publish(event).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().id, event_id);
        assert_eq!(rx2.recv().await.unwrap().id, event_id);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.publish(event()).await.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(event()).await.unwrap();

        let mut rx = bus.subscribe();
        let later = event();
        let later_id = later.id;
        bus.publish(later).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().id, later_id);
    }
}
