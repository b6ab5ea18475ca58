use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod catalog_item;

pub use catalog_item::{clean_title, normalize, CatalogItem, WatchStatus};

/// Raw source record before normalization
pub type RawRecord = serde_json::Value;

/// Outcome of mirroring the corpus to the semantic index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum IndexStatus {
    Uploaded {
        file_id: String,
        vector_store_id: String,
    },
    /// No index is configured for this deployment
    Skipped { reason: String },
    /// The index was configured but the upload failed
    Failed { reason: String },
}

impl IndexStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, IndexStatus::Failed { .. })
    }
}

impl Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexStatus::Uploaded {
                file_id,
                vector_store_id,
            } => write!(f, "uploaded {} to {}", file_id, vector_store_id),
            IndexStatus::Skipped { reason } => write!(f, "skipped: {}", reason),
            IndexStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Identifiers returned by a successful corpus upload
#[derive(Debug, Clone, PartialEq)]
pub struct IndexReceipt {
    pub file_id: String,
    pub vector_store_id: String,
}

impl From<IndexReceipt> for IndexStatus {
    fn from(receipt: IndexReceipt) -> Self {
        IndexStatus::Uploaded {
            file_id: receipt.file_id,
            vector_store_id: receipt.vector_store_id,
        }
    }
}

/// Result of one full catalog sync
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncResult {
    pub item_count: usize,
    /// Records dropped by normalization
    pub skipped_count: usize,
    /// Name of the source the catalog was read from
    pub source: String,
    pub index_status: IndexStatus,
    pub synced_at: DateTime<Utc>,
}

/// What happened when a recommendation list was published
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PublishOutcome {
    pub playlist_created: bool,
    pub notification_sent: bool,
}

// ============================================================================
// Plex API Types
// ============================================================================

/// Envelope wrapping every Plex JSON response
#[derive(Debug, Clone, Deserialize)]
pub struct PlexResponse<T> {
    #[serde(rename = "MediaContainer")]
    pub media_container: T,
}

/// GET /library/sections
#[derive(Debug, Clone, Deserialize)]
pub struct PlexSections {
    #[serde(rename = "Directory", default)]
    pub directories: Vec<PlexDirectory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexDirectory {
    pub key: String,
    pub title: String,
}

/// GET /library/sections/{key}/all; metadata is left raw for normalization
#[derive(Debug, Clone, Deserialize)]
pub struct PlexMetadataList {
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<RawRecord>,
}

/// GET /
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexServerIdentity {
    pub machine_identifier: String,
}

/// GET /playlists
#[derive(Debug, Clone, Deserialize)]
pub struct PlexPlaylists {
    #[serde(rename = "Metadata", default)]
    pub playlists: Vec<PlexPlaylist>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexPlaylist {
    pub rating_key: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_status_display() {
        let status = IndexStatus::Failed {
            reason: "connection refused".to_string(),
        };
        assert_eq!(format!("{}", status), "failed: connection refused");
        assert!(status.is_failure());

        let status = IndexStatus::Skipped {
            reason: "no index configured".to_string(),
        };
        assert_eq!(format!("{}", status), "skipped: no index configured");
        assert!(!status.is_failure());
    }

    #[test]
    fn test_index_status_serde() {
        let status = IndexStatus::from(IndexReceipt {
            file_id: "file_1".to_string(),
            vector_store_id: "vs_1".to_string(),
        });
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "uploaded");
        assert_eq!(json["file_id"], "file_1");
    }

    #[test]
    fn test_plex_sections_deserialization() {
        let json = r#"{
            "MediaContainer": {
                "size": 2,
                "Directory": [
                    {"key": "1", "title": "Movies", "type": "movie"},
                    {"key": "2", "title": "TV Shows", "type": "show"}
                ]
            }
        }"#;

        let response: PlexResponse<PlexSections> = serde_json::from_str(json).unwrap();
        let sections = response.media_container.directories;
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].key, "1");
        assert_eq!(sections[0].title, "Movies");
        assert_eq!(sections[1].title, "TV Shows");
    }

    #[test]
    fn test_plex_playlists_deserialization() {
        let json = r#"{
            "MediaContainer": {
                "Metadata": [
                    {"ratingKey": "901", "title": "Recommended by AI", "playlistType": "video"}
                ]
            }
        }"#;

        let response: PlexResponse<PlexPlaylists> = serde_json::from_str(json).unwrap();
        assert_eq!(response.media_container.playlists[0].rating_key, "901");
    }

    #[test]
    fn test_plex_empty_metadata_defaults() {
        let json = r#"{"MediaContainer": {"size": 0}}"#;
        let response: PlexResponse<PlexMetadataList> = serde_json::from_str(json).unwrap();
        assert!(response.media_container.metadata.is_empty());
    }
}
