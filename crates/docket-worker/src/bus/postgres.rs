use async_trait::async_trait;
use docket_core::models::DocumentChangedEvent;
use docket_core::AppError;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{EventPublisher, EventSubscriber, SubscriptionSource};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const SUBSCRIBER_BUFFER: usize = 256;

/// Publishes events as JSON payloads through `pg_notify`.
#[derive(Clone)]
pub struct PgNotifyPublisher {
    pool: PgPool,
    channel: String,
}

impl PgNotifyPublisher {
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for PgNotifyPublisher {
    #[tracing::instrument(skip(self, event), fields(channel = %self.channel, document.id = %event.document_id))]
    async fn publish(&self, event: &DocumentChangedEvent) -> Result<(), AppError> {
        let payload = serde_json::to_string(event)?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    change_type = %event.change_type,
                    "Failed to publish document change event"
                );
                AppError::EventBus(format!("pg_notify failed: {}", e))
            })?;

        tracing::debug!(change_type = %event.change_type, "Published document change event");
        Ok(())
    }
}

/// Opens [`PgEventSubscriber`]s on one channel.
#[derive(Clone)]
pub struct PgSubscriptionSource {
    pool: PgPool,
    channel: String,
}

impl PgSubscriptionSource {
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl SubscriptionSource for PgSubscriptionSource {
    async fn subscribe(&self) -> Result<Box<dyn EventSubscriber>, AppError> {
        Ok(Box::new(PgEventSubscriber::spawn(
            self.pool.clone(),
            self.channel.clone(),
        )))
    }
}

/// LISTENs on a channel from a background task.
///
/// The listener reconnects after failures, so notifications sent while it is down are
/// lost; stage workers sweep the repository to recover them. The task stops when the
/// subscriber is dropped.
pub struct PgEventSubscriber {
    receiver: mpsc::Receiver<DocumentChangedEvent>,
}

impl PgEventSubscriber {
    pub fn spawn(pool: PgPool, channel: String) -> Self {
        let (tx, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        tokio::spawn(listen_loop(pool, channel, tx));
        Self { receiver }
    }
}

#[async_trait]
impl EventSubscriber for PgEventSubscriber {
    async fn recv(&mut self) -> Option<DocumentChangedEvent> {
        self.receiver.recv().await
    }
}

async fn listen_loop(pool: PgPool, channel: String, tx: mpsc::Sender<DocumentChangedEvent>) {
    loop {
        match PgListener::connect_with(&pool).await {
            Ok(mut listener) => {
                if let Err(e) = listener.listen(&channel).await {
                    tracing::warn!(error = %e, channel = %channel, "LISTEN failed, will retry");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
                tracing::info!(channel = %channel, "Listening for document change events");

                loop {
                    let notification = match listener.recv().await {
                        Ok(notification) => notification,
                        Err(e) => {
                            tracing::warn!(error = %e, channel = %channel, "PgListener recv failed, reconnecting");
                            break;
                        }
                    };

                    let Some(event) = decode_payload(notification.payload()) else {
                        continue;
                    };
                    if tx.send(event).await.is_err() {
                        tracing::debug!(channel = %channel, "Subscriber dropped, stopping listener");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "PgListener connect failed, will retry");
            }
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

fn decode_payload(payload: &str) -> Option<DocumentChangedEvent> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, payload, "Skipping undecodable document change event");
            None
        }
    }
}
