use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::{
    db::{SnapshotMirror, SnapshotStore},
    error::AppResult,
    models::{normalize, CatalogItem, IndexStatus, SyncResult},
    services::{
        index::SemanticIndex,
        notifier::{sync_message, Notifier},
        providers::CatalogSource,
    },
};

/// Rebuilds the catalog snapshot from the source
///
/// Sync steps:
/// 1. Fetch every record from the source (fatal on failure)
/// 2. Normalize, dropping records that cannot be used
/// 3. Replace the snapshot in one step
/// 4. Mirror the corpus to the semantic index (soft failure)
/// 5. Queue the Redis mirror write, when configured
pub struct SyncOrchestrator {
    source: Arc<dyn CatalogSource>,
    store: Arc<SnapshotStore>,
    index: Option<Arc<dyn SemanticIndex>>,
    mirror: Option<SnapshotMirror>,
    /// Held for the whole sync so only one rebuild runs at a time
    sync_lock: Mutex<()>,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        store: Arc<SnapshotStore>,
        index: Option<Arc<dyn SemanticIndex>>,
    ) -> Self {
        Self {
            source,
            store,
            index,
            mirror: None,
            sync_lock: Mutex::new(()),
        }
    }

    /// Mirrors every new snapshot to Redis
    pub fn with_mirror(mut self, mirror: SnapshotMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Runs one full rebuild; success means the snapshot was replaced
    pub async fn sync(&self) -> AppResult<SyncResult> {
        let _guard = self.sync_lock.lock().await;

        tracing::info!(source = self.source.name(), "Starting library sync");

        let records = self.source.fetch_all_items().await.map_err(|e| {
            tracing::error!(error = %e, source = self.source.name(), "Catalog fetch failed");
            e
        })?;

        let fetched = records.len();
        let items = normalize_all(&records);
        let skipped_count = fetched - items.len();
        let item_count = items.len();

        let document = match serde_json::to_vec_pretty(&items) {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::error!(error = %e, "Corpus serialization failed");
                None
            }
        };

        self.store.replace(items).await;
        let snapshot = self.store.snapshot().await;
        let synced_at = snapshot.synced_at.unwrap_or_else(Utc::now);

        tracing::info!(item_count, skipped_count, "Snapshot replaced");

        let index_status = match document {
            Some(document) => self.mirror_to_index(document).await,
            None => IndexStatus::Failed {
                reason: "corpus could not be serialized".to_string(),
            },
        };

        if let Some(mirror) = &self.mirror {
            mirror.mirror_snapshot(&snapshot);
        }

        tracing::info!(
            item_count,
            index_status = %index_status,
            "Library sync completed"
        );

        Ok(SyncResult {
            item_count,
            skipped_count,
            source: self.source.name().to_string(),
            index_status,
            synced_at,
        })
    }

    async fn mirror_to_index(&self, document: Vec<u8>) -> IndexStatus {
        let Some(index) = &self.index else {
            return IndexStatus::Skipped {
                reason: "no semantic index configured".to_string(),
            };
        };

        match index.upload_corpus(document).await {
            Ok(receipt) => receipt.into(),
            Err(e) => {
                tracing::warn!(error = %e, index = index.name(), "Index mirror failed");
                IndexStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Normalizes every record, logging and skipping the ones that fail
pub fn normalize_all(records: &[serde_json::Value]) -> Vec<CatalogItem> {
    let mut skipped = 0usize;
    let items: Vec<CatalogItem> = records
        .iter()
        .filter_map(|record| match normalize(record) {
            Ok(item) => Some(item),
            Err(e) => {
                skipped += 1;
                tracing::debug!(error = %e, "Record skipped");
                None
            }
        })
        .collect();

    if skipped > 0 {
        tracing::warn!(skipped, total = records.len(), "Some records failed normalization");
    }

    items
}

// ============================================================================
// Background sync queue
// ============================================================================

/// A request to rebuild the catalog
#[derive(Debug, Clone)]
pub struct SyncJob {
    /// Request that triggered the job, for log correlation
    pub requested_by: String,
}

/// Hands sync jobs to the background worker; callers never wait for the result
#[derive(Clone)]
pub struct SyncQueue {
    job_tx: mpsc::UnboundedSender<SyncJob>,
}

/// Handle for gracefully shutting down the sync worker
pub struct SyncWorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl SyncWorkerHandle {
    /// Stops the worker after the queued jobs have run
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Sync worker task panicked");
        }
    }
}

impl SyncQueue {
    /// Spawns the worker that consumes sync jobs
    pub fn spawn(
        orchestrator: Arc<SyncOrchestrator>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> (Self, SyncWorkerHandle) {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            Self::sync_worker_task(orchestrator, notifier, job_rx, shutdown_rx).await;
        });

        (Self { job_tx }, SyncWorkerHandle { shutdown_tx, task })
    }

    /// Queues a job; returns false if the worker has stopped
    pub fn enqueue(&self, job: SyncJob) -> bool {
        match self.job_tx.send(job) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to queue sync job");
                false
            }
        }
    }

    async fn sync_worker_task(
        orchestrator: Arc<SyncOrchestrator>,
        notifier: Option<Arc<dyn Notifier>>,
        mut job_rx: mpsc::UnboundedReceiver<SyncJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Sync worker task started");

        loop {
            tokio::select! {
                Some(job) = job_rx.recv() => {
                    Self::run_job(&orchestrator, notifier.as_deref(), job).await;
                }
                Some(()) = shutdown_rx.recv() => {
                    job_rx.close();
                    while let Some(job) = job_rx.recv().await {
                        Self::run_job(&orchestrator, notifier.as_deref(), job).await;
                    }
                    tracing::info!("Sync worker task stopped");
                    break;
                }
                // Queue and handle both dropped
                else => break,
            }
        }
    }

    async fn run_job(orchestrator: &SyncOrchestrator, notifier: Option<&dyn Notifier>, job: SyncJob) {
        match orchestrator.sync().await {
            Ok(result) => {
                tracing::info!(
                    requested_by = %job.requested_by,
                    item_count = result.item_count,
                    "Background sync completed"
                );
                if let Some(notifier) = notifier {
                    if let Err(e) = notifier.send(&sync_message(result.item_count)).await {
                        tracing::warn!(error = %e, "Sync notification failed");
                    }
                }
            }
            Err(e) => {
                tracing::error!(requested_by = %job.requested_by, error = %e, "Background sync failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::IndexReceipt;
    use crate::services::index::MockSemanticIndex;
    use crate::services::notifier::MockNotifier;
    use crate::services::providers::{FixtureSource, MockCatalogSource};
    use serde_json::json;

    fn records() -> Vec<serde_json::Value> {
        vec![
            json!({"title": "Dune", "Genre": "Sci-Fi", "rating": 8.0, "viewCount": 0}),
            json!({"title": "Heat", "viewCount": 2}),
            json!({"title": ""}),
        ]
    }

    #[tokio::test]
    async fn test_sync_replaces_snapshot_and_counts_skips() {
        let store = Arc::new(SnapshotStore::new());
        let orchestrator = SyncOrchestrator::new(
            Arc::new(FixtureSource::from_records(records())),
            store.clone(),
            None,
        );

        let result = orchestrator.sync().await.unwrap();

        assert_eq!(result.item_count, 2);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(result.source, "fixture");
        assert!(matches!(result.index_status, IndexStatus::Skipped { .. }));
        assert_eq!(store.all().await.len(), 2);
        assert_eq!(store.unwatched().await[0].title, "Dune");
    }

    #[tokio::test]
    async fn test_source_failure_keeps_previous_snapshot() {
        let store = Arc::new(SnapshotStore::new());
        store.replace(vec![CatalogItem::new("Old Favourite")]).await;

        let mut source = MockCatalogSource::new();
        source
            .expect_fetch_all_items()
            .times(1)
            .returning(|| Err(AppError::SourceUnavailable("connection refused".to_string())));
        source.expect_name().return_const("mock");

        let orchestrator = SyncOrchestrator::new(Arc::new(source), store.clone(), None);
        let result = orchestrator.sync().await;

        assert!(matches!(result, Err(AppError::SourceUnavailable(_))));
        let titles: Vec<String> = store.all().await.into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["Old Favourite"]);
    }

    #[tokio::test]
    async fn test_index_failure_is_soft() {
        let store = Arc::new(SnapshotStore::new());
        let mut index = MockSemanticIndex::new();
        index
            .expect_upload_corpus()
            .times(1)
            .returning(|_| Err(AppError::IndexMirrorFailed("index unreachable".to_string())));
        index.expect_name().return_const("mock");

        let orchestrator = SyncOrchestrator::new(
            Arc::new(FixtureSource::from_records(records())),
            store.clone(),
            Some(Arc::new(index)),
        );

        let result = orchestrator.sync().await.unwrap();

        assert!(result.index_status.is_failure());
        assert!(result.index_status.to_string().contains("index unreachable"));
        assert!(store.has_data().await);
    }

    #[tokio::test]
    async fn test_index_timeout_is_soft() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let config = crate::config::Config {
            openai_api_key: Some("sk-test".to_string()),
            openai_api_url: format!("http://{}", addr),
            request_timeout_secs: 1,
            ..Default::default()
        };
        let index = crate::services::index::OpenAiIndex::new(&config).unwrap();

        let store = Arc::new(SnapshotStore::new());
        let orchestrator = SyncOrchestrator::new(
            Arc::new(FixtureSource::from_records(records())),
            store.clone(),
            Some(Arc::new(index)),
        );

        let result = orchestrator.sync().await.unwrap();

        match &result.index_status {
            IndexStatus::Failed { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected a failed index status, got {}", other),
        }
        assert_eq!(result.item_count, 2);
        assert_eq!(store.all().await.len(), 2);
    }

    #[tokio::test]
    async fn test_index_receives_normalized_corpus() {
        let mut index = MockSemanticIndex::new();
        index
            .expect_upload_corpus()
            .withf(|document| {
                let items: Vec<CatalogItem> = serde_json::from_slice(document).unwrap();
                items.len() == 2 && items[0].title == "Dune"
            })
            .times(1)
            .returning(|_| {
                Ok(IndexReceipt {
                    file_id: "file_1".to_string(),
                    vector_store_id: "vs_1".to_string(),
                })
            });

        let orchestrator = SyncOrchestrator::new(
            Arc::new(FixtureSource::from_records(records())),
            Arc::new(SnapshotStore::new()),
            Some(Arc::new(index)),
        );

        let result = orchestrator.sync().await.unwrap();
        assert_eq!(
            result.index_status,
            IndexStatus::Uploaded {
                file_id: "file_1".to_string(),
                vector_store_id: "vs_1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_concurrent_syncs_are_serialized() {
        let store = Arc::new(SnapshotStore::new());
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(FixtureSource::from_records(records())),
            store.clone(),
            None,
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move { orchestrator.sync().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().item_count, 2);
        }
        assert_eq!(store.all().await.len(), 2);
    }

    #[tokio::test]
    async fn test_queue_runs_job_and_notifies() {
        let store = Arc::new(SnapshotStore::new());
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(FixtureSource::from_records(records())),
            store.clone(),
            None,
        ));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|message| message.contains("2 movies"))
            .times(1)
            .returning(|_| Ok(true));

        let (queue, handle) = SyncQueue::spawn(orchestrator, Some(Arc::new(notifier)));
        assert!(queue.enqueue(SyncJob {
            requested_by: "test".to_string(),
        }));

        handle.shutdown().await;
        assert!(store.has_data().await);
    }

    #[test]
    fn test_normalize_all_skips_bad_records() {
        let items = normalize_all(&records());
        assert_eq!(items.len(), 2);
    }
}
