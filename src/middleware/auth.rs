use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::ApiError;

/// Header carrying the opaque session token
pub const ACCESS_TOKEN_HEADER: &str = "x-accesstoken";

/// Resolve `X-AccessToken` to a live Session and inject it into the request
/// extensions. Missing, unknown and expired tokens are all rejected with 403.
pub async fn session_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let Some(token) = access_token(request.headers()) else {
        return ApiError::forbidden("Missing access token").into_response();
    };

    let session = state.sessions.fetch(&token).await;
    if !session.is_valid() {
        tracing::debug!("Rejected request with unknown or expired session token");
        return ApiError::forbidden("Invalid or expired session").into_response();
    }

    request.extensions_mut().insert(session);
    next.run(request).await
}

/// Extract the session token, ignoring empty or non-ASCII values
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
