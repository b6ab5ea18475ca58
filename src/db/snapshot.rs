use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::CatalogItem;

/// One immutable version of the catalog
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub items: Vec<CatalogItem>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Holds the current catalog snapshot
///
/// Readers clone the `Arc` of the current version, so a concurrent `replace`
/// never exposes a mix of old and new items. `replace` is the only mutator.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in a new snapshot wholesale
    pub async fn replace(&self, items: Vec<CatalogItem>) {
        self.replace_at(items, Utc::now()).await;
    }

    /// Swaps in a snapshot taken at a known time (used when hydrating from the mirror)
    pub async fn replace_at(&self, items: Vec<CatalogItem>, synced_at: DateTime<Utc>) {
        let next = Arc::new(Snapshot {
            items,
            synced_at: Some(synced_at),
        });
        *self.current.write().await = next;
    }

    /// Returns the current version without copying its items
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    pub async fn has_data(&self) -> bool {
        !self.snapshot().await.items.is_empty()
    }

    pub async fn all(&self) -> Vec<CatalogItem> {
        self.snapshot().await.items.clone()
    }

    /// Items not yet watched, in snapshot order
    pub async fn unwatched(&self) -> Vec<CatalogItem> {
        self.snapshot()
            .await
            .items
            .iter()
            .filter(|item| !item.is_watched())
            .cloned()
            .collect()
    }

    pub async fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot().await.synced_at
    }
}
