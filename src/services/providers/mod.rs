//! Catalog source abstraction
//!
//! A source supplies the raw catalog, the recent watch history and playlist
//! publishing. `PlexSource` talks to a Plex server; `FixtureSource` serves a
//! sample JSON file or in-memory records. The variant is chosen once, from
//! configuration, when the application state is built.
use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    models::{CatalogItem, RawRecord},
};

pub mod fixture;
pub mod plex;

pub use fixture::FixtureSource;
pub use plex::PlexSource;

/// Trait for catalog sources
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every movie in the library as raw records
    ///
    /// Connectivity failures and timeouts surface as `SourceUnavailable`.
    async fn fetch_all_items(&self) -> AppResult<Vec<RawRecord>>;

    /// Fetch up to `limit` watched movies, most recently viewed first
    async fn fetch_recent_history(&self, limit: usize) -> AppResult<Vec<RawRecord>>;

    /// Replace the playlist called `name` with `items`
    ///
    /// Returns `false` when nothing could be added.
    async fn create_or_replace_playlist(&self, name: &str, items: &[CatalogItem])
        -> AppResult<bool>;

    /// Source name for logging and sync results
    fn name(&self) -> &'static str;
}

/// Builds the source selected by configuration
pub fn build_source(config: &Config) -> AppResult<Arc<dyn CatalogSource>> {
    if config.should_use_sample() {
        tracing::info!(
            path = %config.sample_data_path.display(),
            "Using sample data as catalog source"
        );
        return Ok(Arc::new(FixtureSource::from_path(
            config.sample_data_path.clone(),
        )));
    }

    let source = PlexSource::new(config)?;
    tracing::info!(library = %config.plex_library_name, "Using Plex as catalog source");
    Ok(Arc::new(source))
}
