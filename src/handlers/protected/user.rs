use axum::{
    extract::{Extension, Query, State},
    response::Json,
};
use serde_json::Value;

use crate::app::AppState;
use crate::entity::USER;
use crate::middleware::ApiResult;
use crate::session::Session;
use super::entity;
use super::params::ListQuery;

/// GET /api/user - List users
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<Value>> {
    entity::list(&USER, &state, query, &session).await
}

/// POST /api/user - Administrators only
pub async fn post(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(session): Extension<Session>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    entity::create(&USER, &state, query, &session, payload).await
}

/// PUT /api/user - Administrators only
pub async fn put(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(session): Extension<Session>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    entity::update(&USER, &state, query, &session, payload).await
}
