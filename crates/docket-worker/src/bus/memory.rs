use async_trait::async_trait;
use docket_core::models::DocumentChangedEvent;
use docket_core::AppError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{EventPublisher, EventSubscriber, SubscriptionSource};

const DEFAULT_CAPACITY: usize = 1024;

/// Process-local bus on a `tokio::sync::broadcast` channel.
///
/// The most recent `capacity` published events are also kept in a log so tests and local
/// tooling can inspect what went out, whether or not anyone was subscribed at the time.
#[derive(Clone)]
pub struct InMemoryEventBus {
    sender: broadcast::Sender<DocumentChangedEvent>,
    published: Arc<Mutex<VecDeque<DocumentChangedEvent>>>,
    log_capacity: usize,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            log_capacity: capacity,
        }
    }

    /// Retained published events, oldest first.
    pub fn published(&self) -> Vec<DocumentChangedEvent> {
        self.published
            .lock()
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn published_for(&self, document_id: Uuid) -> Vec<DocumentChangedEvent> {
        self.published()
            .into_iter()
            .filter(|e| e.document_id == document_id)
            .collect()
    }

    pub fn subscriber(&self) -> InMemorySubscriber {
        InMemorySubscriber {
            receiver: self.sender.subscribe(),
        }
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: &DocumentChangedEvent) -> Result<(), AppError> {
        {
            let mut log = self
                .published
                .lock()
                .map_err(|_| AppError::EventBus("Event log lock poisoned".to_string()))?;
            if log.len() == self.log_capacity {
                log.pop_front();
            }
            log.push_back(event.clone());
        }

        // No receivers is not an error: nobody is interested yet.
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        tracing::debug!(
            document_id = %event.document_id,
            change_type = %event.change_type,
            receivers,
            "Published document change event"
        );
        Ok(())
    }
}

#[async_trait]
impl SubscriptionSource for InMemoryEventBus {
    async fn subscribe(&self) -> Result<Box<dyn EventSubscriber>, AppError> {
        Ok(Box::new(self.subscriber()))
    }
}

pub struct InMemorySubscriber {
    receiver: broadcast::Receiver<DocumentChangedEvent>,
}

#[async_trait]
impl EventSubscriber for InMemorySubscriber {
    async fn recv(&mut self) -> Option<DocumentChangedEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_logged() {
        let bus = InMemoryEventBus::default();
        let id = Uuid::new_v4();
        bus.publish(&DocumentChangedEvent::uploaded(id)).await.unwrap();

        assert_eq!(bus.published().len(), 1);
        assert_eq!(bus.published_for(id).len(), 1);
        assert!(bus.published_for(Uuid::new_v4()).is_empty());
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let bus = InMemoryEventBus::default();
        let mut first = bus.subscriber();
        let mut second = bus.subscriber();

        let event = DocumentChangedEvent::updated(Uuid::new_v4());
        bus.publish(&event).await.unwrap();

        assert_eq!(first.recv().await, Some(event.clone()));
        assert_eq!(second.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let bus = InMemoryEventBus::new(2);
        let mut subscriber = bus.subscriber();

        let events: Vec<_> = (0..5)
            .map(|_| DocumentChangedEvent::updated(Uuid::new_v4()))
            .collect();
        for event in &events {
            bus.publish(event).await.unwrap();
        }

        assert_eq!(subscriber.recv().await, Some(events[3].clone()));
        assert_eq!(subscriber.recv().await, Some(events[4].clone()));
    }

    #[tokio::test]
    async fn test_event_log_keeps_only_latest() {
        let bus = InMemoryEventBus::new(4);
        let ids: Vec<_> = (0..1000).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            bus.publish(&DocumentChangedEvent::updated(*id)).await.unwrap();
        }

        let retained: Vec<_> = bus.published().iter().map(|e| e.document_id).collect();
        assert_eq!(retained, ids[996..].to_vec());
    }

    #[tokio::test]
    async fn test_closed_when_bus_dropped() {
        let bus = InMemoryEventBus::default();
        let mut subscriber = bus.subscriber();
        drop(bus);
        assert_eq!(subscriber.recv().await, None);
    }
}
