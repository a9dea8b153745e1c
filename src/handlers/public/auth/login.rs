// handlers/public/auth/login.rs - POST /api/login handler

use axum::{extract::State, response::Json};
use serde_json::Value;

use crate::app::AppState;
use crate::auth::credentials;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::Session;

/// POST /api/login - Check credentials and open a session
///
/// Expected Input:
/// ```json
/// { "login": "string", "password": "string" }
/// ```
///
/// On success the result is the session, including the `sid` token the
/// client sends back in `X-AccessToken`. A missing or malformed field is a
/// 400 naming that field; wrong credentials are 403.
pub async fn login(State(state): State<AppState>, Json(payload): Json<Value>) -> ApiResult<Session> {
    let (login, password) = credentials(&payload)?;

    match state.auth.login(&login, &password).await? {
        Some(session) => Ok(ApiResponse::success(session)),
        None => Err(ApiError::forbidden("Invalid login or password")),
    }
}
