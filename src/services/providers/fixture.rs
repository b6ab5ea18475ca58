//! Sample-data catalog source
//!
//! Reads a JSON file that is either a Plex `MediaContainer` export or a plain
//! array of records. Tests build it from in-memory records instead.
use std::path::PathBuf;

use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogItem, RawRecord},
    services::providers::CatalogSource,
};

enum Records {
    File(PathBuf),
    Memory(Vec<RawRecord>),
}

pub struct FixtureSource {
    records: Records,
}

impl FixtureSource {
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            records: Records::File(path),
        }
    }

    pub fn from_records(records: Vec<RawRecord>) -> Self {
        Self {
            records: Records::Memory(records),
        }
    }

    async fn load(&self) -> AppResult<Vec<RawRecord>> {
        match &self.records {
            Records::Memory(records) => Ok(records.clone()),
            Records::File(path) => {
                let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
                    AppError::SourceUnavailable(format!(
                        "Cannot read sample data {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let document: Value = serde_json::from_str(&contents).map_err(|e| {
                    AppError::SourceUnavailable(format!(
                        "Invalid sample data {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                extract_records(document)
            }
        }
    }
}

/// Accepts `{"MediaContainer": {"Metadata": [...]}}` or a bare array
fn extract_records(document: Value) -> AppResult<Vec<RawRecord>> {
    match document {
        Value::Array(records) => Ok(records),
        Value::Object(mut root) => match root
            .remove("MediaContainer")
            .and_then(|mut container| container.get_mut("Metadata").map(Value::take))
        {
            Some(Value::Array(records)) => Ok(records),
            _ => Err(AppError::SourceUnavailable(
                "Sample data has no MediaContainer.Metadata list".to_string(),
            )),
        },
        _ => Err(AppError::SourceUnavailable(
            "Sample data must be an array or a MediaContainer document".to_string(),
        )),
    }
}

fn view_count(record: &RawRecord) -> f64 {
    ["viewCount", "ViewCount", "view_count"]
        .iter()
        .filter_map(|key| record.get(*key))
        .find_map(|v| v.as_f64().or_else(|| v.as_str()?.trim().parse().ok()))
        .unwrap_or(0.0)
}

fn is_watched(record: &RawRecord) -> bool {
    if view_count(record) > 0.0 {
        return true;
    }
    record
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("watched"))
}

fn last_viewed_at(record: &RawRecord) -> i64 {
    record
        .get("lastViewedAt")
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl CatalogSource for FixtureSource {
    async fn fetch_all_items(&self) -> AppResult<Vec<RawRecord>> {
        let records = self.load().await?;
        tracing::info!(count = records.len(), provider = "fixture", "Catalog loaded");
        Ok(records)
    }

    async fn fetch_recent_history(&self, limit: usize) -> AppResult<Vec<RawRecord>> {
        let mut watched: Vec<RawRecord> = self
            .load()
            .await?
            .into_iter()
            .filter(is_watched)
            .collect();

        // Stable, so records without a timestamp keep file order
        watched.sort_by_key(|record| std::cmp::Reverse(last_viewed_at(record)));
        watched.truncate(limit);
        Ok(watched)
    }

    async fn create_or_replace_playlist(
        &self,
        name: &str,
        items: &[CatalogItem],
    ) -> AppResult<bool> {
        tracing::info!(
            playlist = %name,
            items = items.len(),
            provider = "fixture",
            "Playlist prepared (sample mode, nothing written)"
        );
        Ok(!items.is_empty())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
