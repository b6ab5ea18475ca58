//! Plex media server source
//!
//! API flow:
//! 1. Section lookup: /library/sections → key of the configured movie library
//! 2. Catalog: /library/sections/{key}/all?type=1
//! 3. History: same listing filtered to watched items, sorted by lastViewedAt
//! 4. Playlist: /playlists (find + delete old), then POST /playlists with a
//!    server:// URI built from the machine identifier and item rating keys
use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{
        CatalogItem, PlexMetadataList, PlexPlaylists, PlexResponse, PlexSections,
        PlexServerIdentity, RawRecord,
    },
    services::providers::CatalogSource,
};
use reqwest::{Client as HttpClient, Method, RequestBuilder};
use serde::de::DeserializeOwned;

const PLEX_TOKEN_HEADER: &str = "X-Plex-Token";
const MOVIE_TYPE: &str = "1";

#[derive(Clone)]
pub struct PlexSource {
    http_client: HttpClient,
    base_url: String,
    token: String,
    library_name: String,
}

impl PlexSource {
    /// Creates a Plex source; requires `PLEX_URL` and `PLEX_TOKEN`
    pub fn new(config: &Config) -> AppResult<Self> {
        let base_url = config
            .plex_url
            .clone()
            .ok_or_else(|| AppError::InvalidInput("PLEX_URL is not set".to_string()))?;
        let token = config
            .plex_token
            .clone()
            .ok_or_else(|| AppError::InvalidInput("PLEX_TOKEN is not set".to_string()))?;

        let http_client = HttpClient::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            library_name: config.plex_library_name.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header(PLEX_TOKEN_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Sends a request and decodes the `MediaContainer` payload
    ///
    /// Every failure here means the server could not be used, so all of them
    /// map to `SourceUnavailable`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = request.send().await.map_err(unavailable)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SourceUnavailable(format!(
                "Plex returned status {}: {}",
                status, body
            )));
        }

        let envelope: PlexResponse<T> = response.json().await.map_err(unavailable)?;
        Ok(envelope.media_container)
    }

    /// Resolves the section key of the configured library
    async fn library_key(&self) -> AppResult<String> {
        let sections: PlexSections = self
            .send(self.request(Method::GET, "/library/sections"))
            .await?;

        find_section_key(&sections, &self.library_name).ok_or_else(|| {
            AppError::SourceUnavailable(format!(
                "Plex library '{}' not found",
                self.library_name
            ))
        })
    }

    async fn machine_identifier(&self) -> AppResult<String> {
        let identity: PlexServerIdentity = self.send(self.request(Method::GET, "/")).await?;
        Ok(identity.machine_identifier)
    }

    /// Deletes every playlist called `name`; failures are only logged
    async fn delete_playlists_named(&self, name: &str) {
        let playlists: PlexPlaylists = match self.send(self.request(Method::GET, "/playlists")).await
        {
            Ok(playlists) => playlists,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list Plex playlists");
                return;
            }
        };

        for playlist in playlists.playlists.iter().filter(|p| p.title == name) {
            let path = format!("/playlists/{}", playlist.rating_key);
            match self.request(Method::DELETE, &path).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(playlist = %name, key = %playlist.rating_key, "Deleted existing playlist");
                }
                Ok(response) => {
                    tracing::warn!(playlist = %name, status = %response.status(), "Playlist delete rejected");
                }
                Err(e) => tracing::warn!(error = %e, playlist = %name, "Playlist delete failed"),
            }
        }
    }
}

fn unavailable(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::SourceUnavailable(format!("Plex request timed out: {}", e))
    } else {
        AppError::SourceUnavailable(format!("Plex request failed: {}", e))
    }
}

fn find_section_key(sections: &PlexSections, library_name: &str) -> Option<String> {
    sections
        .directories
        .iter()
        .find(|d| d.title == library_name)
        .map(|d| d.key.clone())
}

/// Builds the `server://` URI Plex expects when creating a playlist
fn playlist_uri(machine_id: &str, rating_keys: &[&str]) -> String {
    format!(
        "server://{}/com.plexapp.plugins.library/library/metadata/{}",
        machine_id,
        rating_keys.join(",")
    )
}

#[async_trait::async_trait]
impl CatalogSource for PlexSource {
    async fn fetch_all_items(&self) -> AppResult<Vec<RawRecord>> {
        let key = self.library_key().await?;
        let path = format!("/library/sections/{}/all", key);

        let listing: PlexMetadataList = self
            .send(self.request(Method::GET, &path).query(&[("type", MOVIE_TYPE)]))
            .await?;

        tracing::info!(
            library = %self.library_name,
            count = listing.metadata.len(),
            provider = "plex",
            "Catalog fetched"
        );

        Ok(listing.metadata)
    }

    async fn fetch_recent_history(&self, limit: usize) -> AppResult<Vec<RawRecord>> {
        let key = self.library_key().await?;
        let path = format!("/library/sections/{}/all", key);
        let size = limit.to_string();

        let listing: PlexMetadataList = self
            .send(self.request(Method::GET, &path).query(&[
                ("type", MOVIE_TYPE),
                ("unwatched", "0"),
                ("sort", "lastViewedAt:desc"),
                ("X-Plex-Container-Start", "0"),
                ("X-Plex-Container-Size", size.as_str()),
            ]))
            .await?;

        let mut history = listing.metadata;
        history.truncate(limit);

        tracing::debug!(count = history.len(), provider = "plex", "History fetched");
        Ok(history)
    }

    async fn create_or_replace_playlist(
        &self,
        name: &str,
        items: &[CatalogItem],
    ) -> AppResult<bool> {
        let rating_keys: Vec<&str> = items
            .iter()
            .filter_map(|item| item.external_id.as_deref())
            .collect();

        if rating_keys.is_empty() {
            tracing::warn!(playlist = %name, "No recommended movie has a Plex rating key");
            return Ok(false);
        }

        let machine_id = self.machine_identifier().await?;
        self.delete_playlists_named(name).await;

        let uri = playlist_uri(&machine_id, &rating_keys);
        let response = self
            .request(Method::POST, "/playlists")
            .query(&[
                ("type", "video"),
                ("title", name),
                ("smart", "0"),
                ("uri", uri.as_str()),
            ])
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SourceUnavailable(format!(
                "Plex playlist creation returned status {}: {}",
                status, body
            )));
        }

        tracing::info!(
            playlist = %name,
            movies = rating_keys.len(),
            provider = "plex",
            "Playlist created"
        );

        Ok(true)
    }

    fn name(&self) -> &'static str {
        "plex"
    }
}
