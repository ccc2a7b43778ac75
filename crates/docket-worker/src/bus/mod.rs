//! Publish/subscribe contracts for [`DocumentChangedEvent`] and their backends.

mod memory;
mod postgres;

pub use memory::InMemoryEventBus;
pub use postgres::{PgEventSubscriber, PgNotifyPublisher, PgSubscriptionSource};

use async_trait::async_trait;
use docket_core::models::DocumentChangedEvent;
use docket_core::{AppError, EventBusBackend, EventBusConfig};
use sqlx::PgPool;
use std::sync::Arc;

/// Delivers change events to whoever listens. Delivery is at-least-once and unordered;
/// a successful return means the bus accepted the event.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DocumentChangedEvent) -> Result<(), AppError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, event: &DocumentChangedEvent) -> Result<(), AppError> {
        (**self).publish(event).await
    }
}

/// One consumer's view of the bus.
#[async_trait]
pub trait EventSubscriber: Send {
    /// Next event, or `None` once the subscription is closed for good.
    async fn recv(&mut self) -> Option<DocumentChangedEvent>;
}

/// Opens new subscriptions on a bus.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn subscribe(&self) -> Result<Box<dyn EventSubscriber>, AppError>;
}

/// Both halves of a configured bus.
#[derive(Clone)]
pub struct EventBus {
    pub publisher: Arc<dyn EventPublisher>,
    pub subscriptions: Arc<dyn SubscriptionSource>,
}

impl EventBus {
    pub fn in_memory(bus: InMemoryEventBus) -> Self {
        Self {
            publisher: Arc::new(bus.clone()),
            subscriptions: Arc::new(bus),
        }
    }

    pub async fn subscribe(&self) -> Result<Box<dyn EventSubscriber>, AppError> {
        self.subscriptions.subscribe().await
    }
}

/// Build the bus selected by `config`. The Postgres bus needs a pool.
pub fn create_event_bus(
    config: &EventBusConfig,
    pool: Option<PgPool>,
) -> Result<EventBus, AppError> {
    match config.backend {
        EventBusBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                AppError::Internal("Postgres event bus requires a database pool".to_string())
            })?;
            tracing::info!(channel = %config.channel, "Using Postgres LISTEN/NOTIFY event bus");
            Ok(EventBus {
                publisher: Arc::new(PgNotifyPublisher::new(pool.clone(), &config.channel)),
                subscriptions: Arc::new(PgSubscriptionSource::new(pool, &config.channel)),
            })
        }
        EventBusBackend::Memory => {
            tracing::info!("Using in-memory event bus");
            Ok(EventBus::in_memory(InMemoryEventBus::default()))
        }
    }
}
