use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::RawRecord,
    services::SyncJob,
};

use super::AppState;

pub const SERVICE_NAME: &str = "Plex AI Curator";

// Request/Response types

#[derive(Debug, Default, Deserialize)]
pub struct RecommendRequest {
    pub limit: Option<usize>,
    /// Replaces the fetched watch history
    pub history: Option<Vec<RawRecord>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendQuery {
    #[serde(default)]
    pub async_mode: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub success: bool,
    pub message: String,
    pub recommendations: Vec<String>,
    pub playlist_created: bool,
    pub notification_sent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncAcceptedResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LibraryStatusResponse {
    pub item_count: usize,
    pub unwatched_count: usize,
    pub synced_at: Option<DateTime<Utc>>,
}

// Handlers

/// Service description
pub async fn root() -> Json<Value> {
    Json(json!({
        "app": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "sync": "POST /sync - Rebuild the catalog snapshot in the background",
            "recommend": "POST /recommend - Recommend unwatched movies",
            "status": "GET /library/status - Snapshot size and age"
        }
    }))
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

/// Size and age of the current snapshot
pub async fn library_status(State(state): State<AppState>) -> Json<LibraryStatusResponse> {
    let snapshot = state.inner.store.snapshot().await;

    Json(LibraryStatusResponse {
        item_count: snapshot.items.len(),
        unwatched_count: snapshot.items.iter().filter(|i| !i.is_watched()).count(),
        synced_at: snapshot.synced_at,
    })
}

/// Queues a background sync and returns immediately
pub async fn sync(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<(StatusCode, Json<SyncAcceptedResponse>)> {
    let queued = state.inner.sync_queue.enqueue(SyncJob {
        requested_by: request_id.as_str(),
    });

    if !queued {
        return Err(AppError::Internal("Sync worker is not running".to_string()));
    }

    tracing::info!(request_id = %request_id, "Sync request received, job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(SyncAcceptedResponse {
            success: true,
            message: "Library sync started in the background".to_string(),
        }),
    ))
}

/// Recommends unwatched movies, then publishes them to the playlist and notifier
///
/// With `?async_mode=true` the work runs in the background and the response
/// carries no titles.
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<RecommendQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<RecommendationResponse>)> {
    let request = parse_recommend_request(&headers, &body)?;
    let limit = request
        .limit
        .unwrap_or(state.config().recommendation_count);

    if limit == 0 {
        return Err(AppError::InvalidInput("limit must be at least 1".to_string()));
    }

    tracing::info!(
        request_id = %request_id,
        limit,
        history_override = request.history.is_some(),
        async_mode = query.async_mode,
        "Processing recommendation request"
    );

    if query.async_mode {
        tokio::spawn(async move {
            match generate_and_publish(&state, limit, request.history).await {
                Ok(response) => tracing::info!(
                    request_id = %request_id,
                    count = response.recommendations.len(),
                    "Background recommendation task completed"
                ),
                Err(e) => tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    "Background recommendation task failed"
                ),
            }
        });

        return Ok((
            StatusCode::ACCEPTED,
            Json(RecommendationResponse {
                success: true,
                message: "Recommendation generation started in the background".to_string(),
                recommendations: Vec::new(),
                playlist_created: false,
                notification_sent: false,
            }),
        ));
    }

    let response = generate_and_publish(&state, limit, request.history).await?;
    Ok((StatusCode::OK, Json(response)))
}

/// An empty body means defaults; anything else must be a valid JSON request
fn parse_recommend_request(headers: &HeaderMap, body: &[u8]) -> AppResult<RecommendRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RecommendRequest::default());
    }

    if !is_json_content_type(headers) {
        return Err(AppError::InvalidInput(
            "Expected request with `Content-Type: application/json`".to_string(),
        ));
    }

    Json::<RecommendRequest>::from_bytes(body)
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
}

async fn generate_and_publish(
    state: &AppState,
    limit: usize,
    history: Option<Vec<RawRecord>>,
) -> AppResult<RecommendationResponse> {
    let items = state.inner.recommender.recommend_items(limit, history).await?;
    let outcome = state.inner.publisher.publish(&items).await;

    let message = if items.is_empty() {
        "No recommendations generated".to_string()
    } else {
        format!("Generated {} recommendations", items.len())
    };

    Ok(RecommendationResponse {
        success: true,
        message,
        recommendations: items.into_iter().map(|item| item.title).collect(),
        playlist_created: outcome.playlist_created,
        notification_sent: outcome.notification_sent,
    })
}
