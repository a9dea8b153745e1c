// handlers/public/auth/register.rs - POST /api/registration handler

use axum::{extract::State, response::Json};
use serde_json::Value;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// POST /api/registration - Create a regular user account
///
/// Expected Input:
/// ```json
/// { "login": "string", "password": "string", "email": "string", "phone": "string" }
/// ```
///
/// Field violations are 400. A login that is already taken comes back as a
/// soft error with a null result.
pub async fn register(State(state): State<AppState>, Json(payload): Json<Value>) -> ApiResult<Value> {
    let outcome = state.auth.registration(&payload).await?;
    Ok(ApiResponse::from(outcome))
}
