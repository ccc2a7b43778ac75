//! Application state shared by every handler.

use docket_core::Config;
use docket_db::DocumentRepository;
use docket_storage::Storage;
use docket_worker::{EventBus, StageWorkerHandle};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::services::upload::UploadOrchestrator;

pub struct AppState {
    pub config: Config,
    pub repository: Arc<dyn DocumentRepository>,
    pub storage: Arc<dyn Storage>,
    pub event_bus: EventBus,
    pub orchestrator: UploadOrchestrator,
    /// In-process stage workers, stopped on shutdown.
    workers: Mutex<Vec<StageWorkerHandle>>,
}

impl AppState {
    pub fn new(
        config: Config,
        repository: Arc<dyn DocumentRepository>,
        storage: Arc<dyn Storage>,
        event_bus: EventBus,
    ) -> Self {
        let orchestrator = UploadOrchestrator::new(
            storage.clone(),
            repository.clone(),
            event_bus.publisher.clone(),
            config.upload_policy().clone(),
        );

        Self {
            config,
            repository,
            storage,
            event_bus,
            orchestrator,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub async fn register_worker(&self, handle: StageWorkerHandle) {
        self.workers.lock().await.push(handle);
    }

    pub async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Stop every registered worker and wait for each to finish.
    pub async fn shutdown_workers(&self) {
        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

impl axum::extract::FromRef<Arc<AppState>> for UploadOrchestrator {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.orchestrator.clone()
    }
}
