use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware, require_api_token};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .merge(protected_routes(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        // Outermost, so the trace span and auth rejections see the request id
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Routes that require the `x-api-token` header
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/sync", post(handlers::sync))
        .route("/recommend", post(handlers::recommend))
        .route("/library/status", get(handlers::library_status))
        .route_layer(middleware::from_fn_with_state(state, require_api_token))
}
