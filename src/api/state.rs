use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::Config,
    db::{create_redis_client, MirrorWriterHandle, SnapshotMirror, SnapshotStore},
    error::{AppError, AppResult},
    services::{
        index::{build_index, SemanticIndex},
        notifier::{build_notifier, Notifier},
        providers::{build_source, CatalogSource},
        Publisher, RecommendationService, SyncOrchestrator, SyncQueue, SyncWorkerHandle,
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: Config,
    pub store: Arc<SnapshotStore>,
    pub sync: Arc<SyncOrchestrator>,
    pub sync_queue: SyncQueue,
    pub recommender: RecommendationService,
    pub publisher: Publisher,
}

/// Background tasks owned by the running application
pub struct BackgroundHandles {
    pub sync_worker: SyncWorkerHandle,
    pub mirror_writer: Option<MirrorWriterHandle>,
}

impl BackgroundHandles {
    /// Drains queued syncs and pending mirror writes
    pub async fn shutdown(self) {
        self.sync_worker.shutdown().await;
        if let Some(mirror_writer) = self.mirror_writer {
            mirror_writer.shutdown().await;
        }
    }
}

impl AppState {
    /// Wires the application from explicit collaborators
    ///
    /// Spawns the sync worker, so it must run inside a tokio runtime.
    pub fn new(
        config: Config,
        source: Arc<dyn CatalogSource>,
        index: Option<Arc<dyn SemanticIndex>>,
        notifier: Option<Arc<dyn Notifier>>,
        mirror: Option<SnapshotMirror>,
        store: Arc<SnapshotStore>,
    ) -> (Self, SyncWorkerHandle) {
        let mut orchestrator = SyncOrchestrator::new(source.clone(), store.clone(), index);
        if let Some(mirror) = mirror {
            orchestrator = orchestrator.with_mirror(mirror);
        }
        let sync = Arc::new(orchestrator);

        let (sync_queue, sync_worker) = SyncQueue::spawn(sync.clone(), notifier.clone());

        let recommender =
            RecommendationService::new(source.clone(), sync.clone(), config.history_lookback);

        let playlist_name = config
            .enable_plex_playlist
            .then(|| config.playlist_name.clone());
        let publisher = Publisher::new(source, notifier, playlist_name);

        let state = Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                sync,
                sync_queue,
                recommender,
                publisher,
            }),
        };

        (state, sync_worker)
    }

    /// Builds every collaborator from configuration
    pub async fn from_config(config: Config) -> AppResult<(Self, BackgroundHandles)> {
        let source = build_source(&config)?;
        let index = build_index(&config)?;
        let notifier = build_notifier(&config)?;
        let store = Arc::new(SnapshotStore::new());

        let (mirror, mirror_writer) = match &config.redis_url {
            Some(redis_url) => {
                let client = create_redis_client(redis_url)
                    .map_err(|e| AppError::Internal(format!("Invalid REDIS_URL: {}", e)))?;
                let (mirror, handle) = SnapshotMirror::new(client, config.request_timeout());
                hydrate_from_mirror(&mirror, &store).await;
                (Some(mirror), Some(handle))
            }
            None => (None, None),
        };

        let (state, sync_worker) = Self::new(config, source, index, notifier, mirror, store);

        Ok((
            state,
            BackgroundHandles {
                sync_worker,
                mirror_writer,
            },
        ))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

/// Loads the last mirrored snapshot so the first request is served warm
async fn hydrate_from_mirror(mirror: &SnapshotMirror, store: &SnapshotStore) {
    match mirror.load_snapshot().await {
        Ok(Some(snapshot)) if !snapshot.items.is_empty() => {
            let count = snapshot.items.len();
            store
                .replace_at(snapshot.items, snapshot.synced_at.unwrap_or_else(Utc::now))
                .await;
            tracing::info!(item_count = count, "Snapshot restored from Redis mirror");
        }
        Ok(_) => tracing::info!("No mirrored snapshot found"),
        Err(e) => tracing::warn!(error = %e, "Could not read mirrored snapshot"),
    }
}
