use std::sync::Arc;

use crate::{
    error::AppError,
    models::{CatalogItem, PublishOutcome},
    services::{
        notifier::{recommendations_message, Notifier},
        providers::CatalogSource,
    },
};

/// Delivers a recommendation list to the playlist and the chat notifier
///
/// Both deliveries are best-effort; failures are logged and reported as `false`.
pub struct Publisher {
    source: Arc<dyn CatalogSource>,
    notifier: Option<Arc<dyn Notifier>>,
    playlist_name: Option<String>,
}

impl Publisher {
    /// `playlist_name` is `None` when playlist publishing is disabled
    pub fn new(
        source: Arc<dyn CatalogSource>,
        notifier: Option<Arc<dyn Notifier>>,
        playlist_name: Option<String>,
    ) -> Self {
        Self {
            source,
            notifier,
            playlist_name,
        }
    }

    pub async fn publish(&self, items: &[CatalogItem]) -> PublishOutcome {
        if items.is_empty() {
            return PublishOutcome::default();
        }

        let playlist_created = self.publish_playlist(items).await;
        let notification_sent = self.notify(items, playlist_created).await;

        PublishOutcome {
            playlist_created,
            notification_sent,
        }
    }

    async fn publish_playlist(&self, items: &[CatalogItem]) -> bool {
        let Some(name) = &self.playlist_name else {
            tracing::debug!("Playlist creation disabled");
            return false;
        };

        match self.source.create_or_replace_playlist(name, items).await {
            Ok(created) => created,
            Err(e) => {
                log_delivery_failure("playlist", &e);
                false
            }
        }
    }

    async fn notify(&self, items: &[CatalogItem], playlist_created: bool) -> bool {
        let Some(notifier) = &self.notifier else {
            return false;
        };

        let titles: Vec<String> = items.iter().map(|item| item.title.clone()).collect();
        let playlist = self
            .playlist_name
            .as_deref()
            .filter(|_| playlist_created);

        match notifier.send(&recommendations_message(&titles, playlist)).await {
            Ok(sent) => sent,
            Err(e) => {
                log_delivery_failure("notification", &e);
                false
            }
        }
    }
}

/// Soft errors are expected degradations; anything else points at a broken collaborator
fn log_delivery_failure(channel: &str, e: &AppError) {
    if e.is_soft() {
        tracing::warn!(error = %e, channel, "Recommendation delivery degraded");
    } else {
        tracing::error!(error = %e, channel, "Recommendation delivery failed");
    }
}
