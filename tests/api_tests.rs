use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use curator_api::{
    api::{create_router, AppState},
    config::Config,
    db::SnapshotStore,
    error::{AppError, AppResult},
    models::{CatalogItem, RawRecord},
    services::providers::{CatalogSource, FixtureSource},
};

const TOKEN: &str = "test-token";

fn token_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-api-token"),
        HeaderValue::from_static(TOKEN),
    )
}

fn test_config() -> Config {
    Config {
        api_auth_token: TOKEN.to_string(),
        ..Config::default()
    }
}

fn sample_source() -> FixtureSource {
    FixtureSource::from_path(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("samples/movies_library.json"))
}

fn create_test_server_with(config: Config, source: Arc<dyn CatalogSource>) -> TestServer {
    let (state, _worker) = AppState::new(
        config,
        source,
        None,
        None,
        None,
        Arc::new(SnapshotStore::new()),
    );
    let app = create_router(state);
    tokio_test::assert_ok!(TestServer::new(app))
}

fn create_test_server() -> TestServer {
    create_test_server_with(test_config(), Arc::new(sample_source()))
}

/// Wraps the bundled sample library and counts catalog fetches
struct CountingSource {
    inner: FixtureSource,
    fetches: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl CatalogSource for CountingSource {
    async fn fetch_all_items(&self) -> AppResult<Vec<RawRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_all_items().await
    }

    async fn fetch_recent_history(&self, limit: usize) -> AppResult<Vec<RawRecord>> {
        self.inner.fetch_recent_history(limit).await
    }

    async fn create_or_replace_playlist(&self, name: &str, items: &[CatalogItem]) -> AppResult<bool> {
        self.inner.create_or_replace_playlist(name, items).await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// A media server that never answers
struct OfflineSource;

#[async_trait::async_trait]
impl CatalogSource for OfflineSource {
    async fn fetch_all_items(&self) -> AppResult<Vec<RawRecord>> {
        Err(AppError::SourceUnavailable("connection refused".to_string()))
    }

    async fn fetch_recent_history(&self, _limit: usize) -> AppResult<Vec<RawRecord>> {
        Err(AppError::SourceUnavailable("connection refused".to_string()))
    }

    async fn create_or_replace_playlist(&self, _name: &str, _items: &[CatalogItem]) -> AppResult<bool> {
        Err(AppError::SourceUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Plex AI Curator");
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let server = create_test_server();
    let response = server.get("/").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["endpoints"]["recommend"].is_string());
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let server = create_test_server();
    let response = server.post("/recommend").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_wrong_token_is_forbidden() {
    let server = create_test_server();
    let response = server
        .post("/sync")
        .add_header(
            HeaderName::from_static("x-api-token"),
            HeaderValue::from_static("nope"),
        )
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server();
    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-abc"),
        )
        .await;

    assert_eq!(response.header("x-request-id"), "trace-abc");
}

#[tokio::test]
async fn test_sync_is_accepted_and_populates_snapshot() {
    let server = create_test_server();
    let (name, value) = token_header();

    let response = server.post("/sync").add_header(name.clone(), value.clone()).await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["success"], true);

    let mut item_count = 0;
    for _ in 0..50 {
        let status: Value = server
            .get("/library/status")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        item_count = status["item_count"].as_u64().unwrap_or(0);
        if item_count > 0 {
            assert!(status["synced_at"].is_string());
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The untitled record is kept; it only lacks metadata
    assert_eq!(item_count, 10);
}

#[tokio::test]
async fn test_library_status_before_sync() {
    let server = create_test_server();
    let (name, value) = token_header();

    let response = server.get("/library/status").add_header(name, value).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["item_count"], 0);
    assert!(body["synced_at"].is_null());
}

#[tokio::test]
async fn test_recommend_returns_unwatched_titles() {
    let server = create_test_server();
    let (name, value) = token_header();

    let response = server
        .post("/recommend")
        .add_header(name, value)
        .json(&json!({ "limit": 3 }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["playlist_created"], false);
    assert_eq!(body["notification_sent"], false);

    let titles: Vec<String> = serde_json::from_value(body["recommendations"].clone()).unwrap();
    assert_eq!(titles.len(), 3);
    for watched in ["Sicario", "Blade Runner 2049", "Heat"] {
        assert!(!titles.iter().any(|t| t == watched));
    }
}

#[tokio::test]
async fn test_recommend_with_history_override() {
    let server = create_test_server();
    let (name, value) = token_header();

    let response = server
        .post("/recommend")
        .add_header(name, value)
        .json(&json!({
            "limit": 2,
            "history": [{
                "title": "Blade Runner 2049",
                "year": 2017,
                "rating": 8.0,
                "Genre": [{ "tag": "Science Fiction" }],
                "Director": [{ "tag": "Denis Villeneuve" }]
            }]
        }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["recommendations"], json!(["Dune", "Arrival"]));
}

#[tokio::test]
async fn test_recommend_without_body_uses_configured_count() {
    let config = Config {
        recommendation_count: 2,
        ..test_config()
    };
    let server = create_test_server_with(config, Arc::new(sample_source()));
    let (name, value) = token_header();

    let body: Value = server.post("/recommend").add_header(name, value).await.json();
    assert_eq!(body["recommendations"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_recommend_rejects_zero_limit() {
    let server = create_test_server();
    let (name, value) = token_header();

    let response = server
        .post("/recommend")
        .add_header(name, value)
        .json(&json!({ "limit": 0 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommend_rejects_malformed_body() {
    let server = create_test_server();
    let (name, value) = token_header();

    let response = server
        .post("/recommend")
        .add_header(name, value)
        .json(&json!({ "limit": "two", "history": "not a list" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap_or_default().starts_with("Invalid input"));
}

#[tokio::test]
async fn test_recommend_rejects_body_without_json_content_type() {
    let server = create_test_server();
    let (name, value) = token_header();

    let response = server
        .post("/recommend")
        .add_header(name, value)
        .text(r#"{"limit": 2}"#)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommend_creates_playlist_when_enabled() {
    let config = Config {
        enable_plex_playlist: true,
        ..test_config()
    };
    let server = create_test_server_with(config, Arc::new(sample_source()));
    let (name, value) = token_header();

    let body: Value = server
        .post("/recommend")
        .add_header(name, value)
        .json(&json!({ "limit": 3 }))
        .await
        .json();
    assert_eq!(body["playlist_created"], true);
}

#[tokio::test]
async fn test_recommend_async_mode_is_accepted() {
    let server = create_test_server();
    let (name, value) = token_header();

    let response = server
        .post("/recommend")
        .add_query_param("async_mode", true)
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::ACCEPTED);

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["recommendations"], json!([]));
}

#[tokio::test]
async fn test_warm_up_sync_runs_once() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        inner: sample_source(),
        fetches: fetches.clone(),
    };
    let server = create_test_server_with(test_config(), Arc::new(source));
    let (name, value) = token_header();

    for _ in 0..2 {
        server
            .post("/recommend")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_source_is_bad_gateway() {
    let server = create_test_server_with(test_config(), Arc::new(OfflineSource));
    let (name, value) = token_header();

    let response = server.post("/recommend").add_header(name, value).await;
    response.assert_status(StatusCode::BAD_GATEWAY);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap_or_default().contains("connection refused"));
}
