//! Stage coordination: decide from the stored document whether a stage has work, run the
//! stage's handler, and merge its result back.
//!
//! A document is processed by at most one task per worker at a time. Events and sweeps
//! that arrive for a document already in flight ask that task to re-check once it is done.
//!
//! Shutdown: [`StageWorkerHandle::shutdown`] stops intake and waits for the event loop to
//! exit. Handler invocations already running complete on their own; tasks still waiting
//! for a permit are dropped.

use async_trait::async_trait;
use docket_core::models::{Document, DocumentChangedEvent, DocumentStatus};
use docket_core::{AppError, ProcessingFlags, WorkerConfig};
use docket_db::DocumentRepository;
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::bus::{EventPublisher, EventSubscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Classification,
    Ocr,
    Extraction,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Classification => "classification",
            Stage::Ocr => "ocr",
            Stage::Extraction => "extraction",
            Stage::Finalize => "finalize",
        }
    }

    /// Whether this stage has work to do on `document` in its current stored state.
    ///
    /// Only documents still in `Processing` have work. Classification also covers the
    /// slug, which is derived from it.
    pub fn is_needed(&self, document: &Document, flags: &ProcessingFlags) -> bool {
        if document.status() != DocumentStatus::Processing {
            return false;
        }
        match self {
            Stage::Classification => document.needs_classification() || document.slug().is_none(),
            Stage::Ocr => document.needs_ocr(flags.ocr_enabled),
            Stage::Extraction => document.needs_extraction(flags.extraction_enabled),
            Stage::Finalize => {
                document.is_processing_complete(flags.ocr_required, flags.extraction_required)
            }
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Result of running a stage's processor on a document.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Classified {
        category: String,
        subcategory: String,
        confidence: f64,
        /// Falls back to one derived from the category and document id.
        slug: Option<String>,
    },
    OcrText(String),
    ExtractedData(serde_json::Value),
    Finished,
    /// The processor declined to produce a result this time.
    Nothing,
}

impl StageOutput {
    /// Apply to `document` through its own mutation rules. Returns whether anything changed.
    pub fn apply_to(self, document: &mut Document) -> Result<bool, AppError> {
        match self {
            StageOutput::Classified {
                category,
                subcategory,
                confidence,
                slug,
            } => {
                let slug = slug.unwrap_or_else(|| fallback_slug(&category, document.id()));
                let classified =
                    document.update_classification(category, subcategory, confidence)?;
                let slugged = document.set_slug(slug)?;
                Ok(classified || slugged)
            }
            StageOutput::OcrText(text) => document.update_ocr_text(text),
            StageOutput::ExtractedData(data) => document.update_extracted_data(data),
            StageOutput::Finished => document.mark_finished(),
            StageOutput::Nothing => Ok(false),
        }
    }
}

fn fallback_slug(category: &str, id: Uuid) -> String {
    let mut slug: String = category
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    if slug.is_empty() {
        slug.push_str("document");
    }
    let id = id.simple().to_string();
    format!("{}-{}", slug, &id[..8])
}

/// A stage processor. External processors (classifier, OCR engine, extractor) plug in here.
///
/// Handlers are only invoked when [`Stage::is_needed`] holds for the freshly read document.
/// Errors are reported to the caller; no retry happens inside the worker.
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn stage(&self) -> Stage;

    async fn handle(&self, document: &Document) -> Result<StageOutput, AppError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// The stage had nothing to do: document missing, deleted, or stage not needed.
    Skipped,
    /// The handler ran but its output changed nothing.
    Unchanged,
    /// The output was merged into the stored document and an `updated` event published.
    Applied(Box<Document>),
}

/// Documents with a processing task, each mapped to whether a re-check was requested
/// while it ran.
#[derive(Default)]
struct InFlight(Mutex<HashMap<Uuid, bool>>);

impl InFlight {
    /// Claim `id`. Returns false, after flagging a re-check, when a task already owns it.
    fn begin(&self, id: Uuid) -> bool {
        let Ok(mut map) = self.0.lock() else {
            return false;
        };
        match map.get_mut(&id) {
            Some(recheck) => {
                *recheck = true;
                false
            }
            None => {
                map.insert(id, false);
                true
            }
        }
    }

    /// Returns true when a re-check was requested; the claim is then kept. Otherwise the
    /// claim is released.
    fn finish(&self, id: Uuid) -> bool {
        let Ok(mut map) = self.0.lock() else {
            return false;
        };
        match map.get_mut(&id) {
            Some(recheck) if *recheck => {
                *recheck = false;
                true
            }
            _ => {
                map.remove(&id);
                false
            }
        }
    }

    fn release(&self, id: Uuid) {
        if let Ok(mut map) = self.0.lock() {
            map.remove(&id);
        }
    }

    fn len(&self) -> usize {
        self.0.lock().map(|map| map.len()).unwrap_or(0)
    }
}

/// Releases a claim if the owning task ends before [`InFlight::finish`] released it.
struct InFlightGuard {
    in_flight: Arc<InFlight>,
    id: Uuid,
    armed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.armed {
            self.in_flight.release(self.id);
        }
    }
}

/// Runs one [`StageHandler`] against change events and periodic sweeps.
pub struct StageWorker {
    handler: Arc<dyn StageHandler>,
    repository: Arc<dyn DocumentRepository>,
    publisher: Arc<dyn EventPublisher>,
    flags: ProcessingFlags,
    config: WorkerConfig,
    in_flight: Arc<InFlight>,
}

impl StageWorker {
    pub fn new(
        handler: Arc<dyn StageHandler>,
        repository: Arc<dyn DocumentRepository>,
        publisher: Arc<dyn EventPublisher>,
        flags: ProcessingFlags,
        config: WorkerConfig,
    ) -> Self {
        Self {
            handler,
            repository,
            publisher,
            flags,
            config,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn stage(&self) -> Stage {
        self.handler.stage()
    }

    /// Documents currently owned by a processing task.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// React to one change event. The event only names the document; its contents are
    /// never trusted.
    pub async fn handle_event(
        &self,
        event: &DocumentChangedEvent,
    ) -> Result<StageOutcome, AppError> {
        self.process(event.document_id).await
    }

    #[tracing::instrument(skip(self), fields(stage = %self.stage(), document.id = %document_id))]
    pub async fn process(&self, document_id: Uuid) -> Result<StageOutcome, AppError> {
        let stage = self.stage();

        let Some(mut document) = self.repository.get_by_id(document_id).await? else {
            tracing::debug!("Document not found, skipping");
            return Ok(StageOutcome::Skipped);
        };
        if document.is_deleted() || !stage.is_needed(&document, &self.flags) {
            tracing::trace!(status = %document.status(), "Stage not needed");
            return Ok(StageOutcome::Skipped);
        }

        let start = std::time::Instant::now();
        let output = self.handler.handle(&document).await.map_err(|e| {
            tracing::error!(
                error = %e,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Stage handler failed"
            );
            e
        })?;

        if !output.apply_to(&mut document)? {
            tracing::debug!("Stage output changed nothing");
            return Ok(StageOutcome::Unchanged);
        }

        let merged = self.repository.update(&document).await?;
        // Deleted meanwhile: the stored record absorbed the write.
        if merged.is_deleted() {
            tracing::debug!(status = %merged.status(), "Stage write absorbed by stored record");
            return Ok(StageOutcome::Unchanged);
        }
        self.publisher
            .publish(&DocumentChangedEvent::updated(document_id))
            .await?;

        tracing::info!(
            status = %merged.status(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Stage applied"
        );
        Ok(StageOutcome::Applied(Box::new(merged)))
    }

    /// Consume `subscriber` until `shutdown_rx` fires or the subscription closes.
    ///
    /// At most `max_concurrency` documents are processed at once. When
    /// `sweep_interval_secs` is non-zero, documents still processing are swept on that
    /// interval (and once at start-up) so events lost by the bus are recovered.
    pub async fn run(
        self: Arc<Self>,
        mut subscriber: Box<dyn EventSubscriber>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let stage = self.stage();
        tracing::info!(
            stage = %stage,
            max_concurrency = self.config.max_concurrency,
            sweep_interval_secs = self.config.sweep_interval_secs,
            "Stage worker started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let sweep_enabled = self.config.sweep_interval_secs > 0;
        let mut sweep =
            tokio::time::interval(Duration::from_secs(self.config.sweep_interval_secs.max(1)));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(stage = %stage, "Stage worker shutting down");
                    break;
                }
                event = subscriber.recv() => match event {
                    Some(event) => self.dispatch(&semaphore, event.document_id),
                    None => {
                        tracing::warn!(stage = %stage, "Event subscription closed");
                        break;
                    }
                },
                _ = sweep.tick(), if sweep_enabled => {
                    self.sweep(&semaphore).await;
                }
            }
        }

        semaphore.close();
        tracing::info!(stage = %stage, "Stage worker stopped");
    }

    /// Spawn [`StageWorker::run`] on the runtime.
    pub fn spawn(self, subscriber: Box<dyn EventSubscriber>) -> StageWorkerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let stage = self.stage();
        let task = tokio::spawn(Arc::new(self).run(subscriber, shutdown_rx));
        StageWorkerHandle {
            stage,
            shutdown_tx,
            task,
        }
    }

    async fn sweep(self: &Arc<Self>, semaphore: &Arc<Semaphore>) {
        match self.repository.list_processing(self.config.sweep_batch).await {
            Ok(documents) => {
                let pending: Vec<Uuid> = documents
                    .iter()
                    .filter(|d| self.stage().is_needed(d, &self.flags))
                    .map(|d| d.id())
                    .collect();
                if !pending.is_empty() {
                    tracing::debug!(stage = %self.stage(), count = pending.len(), "Sweep found pending documents");
                }
                for id in pending {
                    self.dispatch(semaphore, id);
                }
            }
            Err(e) => tracing::error!(error = %e, stage = %self.stage(), "Processing sweep failed"),
        }
    }

    fn dispatch(self: &Arc<Self>, semaphore: &Arc<Semaphore>, document_id: Uuid) {
        if !self.in_flight.begin(document_id) {
            tracing::trace!(stage = %self.stage(), document_id = %document_id, "Already in flight");
            return;
        }
        let mut guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            id: document_id,
            armed: true,
        };
        let worker = Arc::clone(self);
        let semaphore = Arc::clone(semaphore);
        tokio::spawn(async move {
            // Closed on shutdown.
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            loop {
                if let Err(e) = worker.process(document_id).await {
                    tracing::error!(
                        error = %e,
                        stage = %worker.stage(),
                        document_id = %document_id,
                        "Stage processing failed"
                    );
                }
                if !worker.in_flight.finish(document_id) {
                    // Released; a later claim for this id belongs to another task.
                    guard.armed = false;
                    break;
                }
            }
        });
    }
}

/// Running [`StageWorker`].
pub struct StageWorkerHandle {
    stage: Stage,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl StageWorkerHandle {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub async fn shutdown(self) {
        tracing::info!(stage = %self.stage, "Initiating stage worker shutdown");
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, stage = %self.stage, "Stage worker task panicked");
        }
    }
}
