//! Test helpers: build AppState and router for integration tests.
//!
//! Everything runs in-process: in-memory repository and event bus, local storage in a
//! temporary directory. No Docker required.

pub mod fixtures;

use axum_test::TestServer;
use docket_api::constants;
use docket_api::setup::{routes, services, storage};
use docket_api::AppState;
use docket_core::{Config, DocketConfig, ProcessingFlags, StorageConfig};
use std::sync::Arc;
use tempfile::TempDir;

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Default configuration with local storage under `dir`.
pub fn test_config(dir: &TempDir) -> DocketConfig {
    let path = dir.path().to_string_lossy().to_string();
    DocketConfig::in_memory(StorageConfig::local(path))
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Setup test app after letting `customize` adjust the configuration. Workers are only
/// started when the configuration enables them.
pub async fn setup_test_app_with(customize: impl FnOnce(&mut DocketConfig)) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut docket_config = test_config(&temp_dir);
    docket_config.worker.finalizer_enabled = false;
    customize(&mut docket_config);
    let config = Config(Box::new(docket_config));

    let storage = storage::setup_storage(&config)
        .await
        .expect("Failed to set up storage");
    let state = services::initialize_services(&config, None, storage)
        .expect("Failed to initialize services");
    services::start_workers(&state)
        .await
        .expect("Failed to start workers");
    let app = routes::setup_routes(&config, state.clone()).expect("Failed to set up routes");

    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Finalizer running, with OCR and extraction switched off so classification alone
/// completes a document.
pub async fn setup_test_app_with_finalizer() -> TestApp {
    setup_test_app_with(|config| {
        config.worker.finalizer_enabled = true;
        config.worker.sweep_interval_secs = 0;
        config.processing = ProcessingFlags::new(false, false);
    })
    .await
}
