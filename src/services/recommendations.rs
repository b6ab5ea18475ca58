use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{clean_title, CatalogItem, RawRecord},
    services::{
        providers::CatalogSource,
        scorer::score_and_rank,
        sync::{normalize_all, SyncOrchestrator},
    },
};

/// Generates personalized watch recommendations
///
/// Ranks the unwatched part of the snapshot by similarity to the recent
/// watch history. An empty snapshot is warmed up with a single sync first.
pub struct RecommendationService {
    source: Arc<dyn CatalogSource>,
    sync: Arc<SyncOrchestrator>,
    history_lookback: usize,
}

impl RecommendationService {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        sync: Arc<SyncOrchestrator>,
        history_lookback: usize,
    ) -> Self {
        Self {
            source,
            sync,
            history_lookback,
        }
    }

    /// Recommended titles, cleaned and de-duplicated in rank order
    pub async fn recommend(
        &self,
        limit: usize,
        history_override: Option<Vec<RawRecord>>,
    ) -> AppResult<Vec<String>> {
        let items = self.recommend_items(limit, history_override).await?;
        Ok(items.into_iter().map(|item| item.title).collect())
    }

    /// Recommended items, with titles cleaned and duplicates removed
    ///
    /// Publishing needs the items themselves (for their source ids), so this
    /// is the primitive and `recommend` maps it to titles.
    pub async fn recommend_items(
        &self,
        limit: usize,
        history_override: Option<Vec<RawRecord>>,
    ) -> AppResult<Vec<CatalogItem>> {
        let store = self.sync.store();

        if !store.has_data().await {
            tracing::info!("Snapshot empty, running warm-up sync");
            let result = self.sync.sync().await?;
            if result.item_count == 0 {
                tracing::warn!("Catalog is empty after warm-up sync");
                return Ok(Vec::new());
            }
        }

        let history = self.history(history_override).await?;
        let candidates = store.unwatched().await;

        tracing::info!(
            history = history.len(),
            candidates = candidates.len(),
            limit,
            "Scoring candidates"
        );

        let ranked = score_and_rank(&history, candidates, limit);
        let recommendations = dedupe_by_title(ranked);

        tracing::info!(count = recommendations.len(), "Generated recommendations");
        Ok(recommendations)
    }

    async fn history(&self, history_override: Option<Vec<RawRecord>>) -> AppResult<Vec<CatalogItem>> {
        let records = match history_override {
            Some(records) => records,
            None => {
                self.source
                    .fetch_recent_history(self.history_lookback)
                    .await?
            }
        };

        if records.is_empty() {
            tracing::warn!("No watch history found, falling back to catalog order");
        }

        Ok(normalize_all(&records))
    }
}

/// Cleans titles and keeps the first item for each distinct title
pub fn dedupe_by_title(items: Vec<CatalogItem>) -> Vec<CatalogItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|mut item| {
            item.title = clean_title(&item.title);
            if item.title.is_empty() || !seen.insert(item.title.clone()) {
                return None;
            }
            Some(item)
        })
        .collect()
}
