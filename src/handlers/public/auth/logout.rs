// handlers/public/auth/logout.rs - POST /api/logout handler

use axum::{extract::State, http::HeaderMap};
use serde_json::Value;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{access_token, ApiResponse, ApiResult};

/// POST /api/logout - Close the session named by `X-AccessToken`
///
/// Without a token there is nothing to close and the call succeeds. A token
/// the server does not know is reported as a server-side failure.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<Value>> {
    if let Some(token) = access_token(&headers) {
        if !state.auth.logout(&token).await {
            return Err(ApiError::internal_server_error("Logout failed"));
        }
    }
    Ok(ApiResponse::success(vec![]))
}
