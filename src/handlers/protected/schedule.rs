use axum::{
    extract::{Extension, Query, State},
    response::Json,
};
use serde_json::Value;

use crate::app::AppState;
use crate::entity::SCHEDULE;
use crate::middleware::ApiResult;
use crate::session::Session;
use super::entity;
use super::params::ListQuery;

/// GET /api/schedule - List schedules
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<Value>> {
    entity::list(&SCHEDULE, &state, query, &session).await
}

/// POST /api/schedule - The caller becomes the owner
pub async fn post(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(session): Extension<Session>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    entity::create(&SCHEDULE, &state, query, &session, payload).await
}

/// PUT /api/schedule - Update by the `id` in the body
pub async fn put(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(session): Extension<Session>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    entity::update(&SCHEDULE, &state, query, &session, payload).await
}
