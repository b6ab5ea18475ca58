use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{api::AppState, error::AppError};

pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Rejects requests without the shared API token
///
/// A missing header is 401, a wrong token is 403.
pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(API_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if !tokens_match(provided, &state.config().api_auth_token) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API token");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// Compares without short-circuiting on the first differing byte
fn tokens_match(provided: &str, expected: &str) -> bool {
    if expected.is_empty() || provided.len() != expected.len() {
        return false;
    }

    provided
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
