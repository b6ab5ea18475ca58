use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use redis::AsyncCommands;
use redis::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::db::snapshot::Snapshot;
use crate::error::{AppError, AppResult};

/// Redis key holding the latest mirrored snapshot
pub const SNAPSHOT_KEY: &str = "catalog:snapshot";

/// Mirrored snapshots expire after a week without a sync
pub const SNAPSHOT_TTL: u64 = 604800;

pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Write-behind copy of the catalog snapshot in Redis
///
/// Only the newest snapshot matters, so pending writes are coalesced: a
/// snapshot queued while an older one is still being written replaces it.
#[derive(Clone)]
pub struct SnapshotMirror {
    redis_client: Client,
    /// Bound on each Redis round trip, connect included
    timeout: Duration,
    latest_tx: Arc<watch::Sender<Option<String>>>,
}

/// Stops the mirror writer after it has written the last queued snapshot
pub struct MirrorWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl MirrorWriterHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Snapshot mirror writer panicked");
        }
        tracing::info!("Snapshot mirror writer stopped");
    }
}

impl SnapshotMirror {
    /// Spawns the background writer
    pub fn new(redis_client: Client, timeout: Duration) -> (Self, MirrorWriterHandle) {
        let (latest_tx, latest_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(Self::writer_task(
            redis_client.clone(),
            timeout,
            latest_rx,
            shutdown_rx,
        ));

        (
            Self {
                redis_client,
                timeout,
                latest_tx: Arc::new(latest_tx),
            },
            MirrorWriterHandle { shutdown_tx, task },
        )
    }

    async fn writer_task(
        client: Client,
        timeout: Duration,
        mut latest_rx: watch::Receiver<Option<String>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::debug!("Snapshot mirror writer started");

        loop {
            tokio::select! {
                changed = latest_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let pending = latest_rx.borrow_and_update().clone();
                    Self::write_pending(&client, timeout, pending).await;
                }
                Some(()) = shutdown_rx.recv() => {
                    if latest_rx.has_changed().unwrap_or(false) {
                        let pending = latest_rx.borrow_and_update().clone();
                        Self::write_pending(&client, timeout, pending).await;
                    }
                    break;
                }
                else => break,
            }
        }
    }

    async fn write_pending(client: &Client, timeout: Duration, pending: Option<String>) {
        let Some(document) = pending else {
            return;
        };

        let size = document.len();
        match bounded(timeout, Self::write_snapshot(client, document)).await {
            Ok(()) => tracing::debug!(bytes = size, "Snapshot mirrored to Redis"),
            Err(e) => tracing::warn!(error = %e, "Failed to mirror snapshot to Redis"),
        }
    }

    async fn write_snapshot(client: &Client, document: String) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(SNAPSHOT_KEY, document, SNAPSHOT_TTL).await?;
        Ok(())
    }

    /// Queues `snapshot` for mirroring without waiting for Redis
    pub fn mirror_snapshot(&self, snapshot: &Snapshot) {
        match serde_json::to_string(snapshot) {
            Ok(document) => {
                self.latest_tx.send_replace(Some(document));
            }
            Err(e) => tracing::error!(error = %e, "Snapshot serialization failed"),
        }
    }

    /// Reads the last mirrored snapshot, `None` when nothing was mirrored
    pub async fn load_snapshot(&self) -> AppResult<Option<Snapshot>> {
        let stored = bounded(self.timeout, self.read_snapshot()).await?;

        stored
            .map(|document| {
                serde_json::from_str(&document).map_err(|e| {
                    AppError::Internal(format!("Mirrored snapshot is unreadable: {}", e))
                })
            })
            .transpose()
    }

    async fn read_snapshot(&self) -> AppResult<Option<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let stored: Option<String> = conn.get(SNAPSHOT_KEY).await?;
        Ok(stored)
    }
}

/// Fails with an I/O mirror error when Redis does not answer in time
async fn bounded<T>(timeout: Duration, operation: impl Future<Output = AppResult<T>>) -> AppResult<T> {
    tokio::time::timeout(timeout, operation).await.unwrap_or_else(|_| {
        Err(AppError::Mirror(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "Redis request timed out",
        ))))
    })
}
