//! Semantic index abstraction
//!
//! The normalized catalog is mirrored to an externally hosted index after
//! every sync. The mirror is best-effort: callers turn any error into a soft
//! `IndexStatus::Failed` instead of failing the sync.
use std::sync::Arc;

use crate::{config::Config, error::AppResult, models::IndexReceipt};

pub mod openai;

pub use openai::OpenAiIndex;

/// File name the corpus is uploaded under
pub const CORPUS_FILE_NAME: &str = "movies_library.json";

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Replace the indexed corpus with `document`
    async fn upload_corpus(&self, document: Vec<u8>) -> AppResult<IndexReceipt>;

    fn name(&self) -> &'static str;
}

/// Builds the configured index, or `None` when no index is configured
pub fn build_index(config: &Config) -> AppResult<Option<Arc<dyn SemanticIndex>>> {
    if !config.has_openai() {
        tracing::info!("No OpenAI key configured, semantic index mirror disabled");
        return Ok(None);
    }

    Ok(Some(Arc::new(OpenAiIndex::new(config)?)))
}
