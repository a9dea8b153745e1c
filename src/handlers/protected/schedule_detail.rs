use axum::{
    extract::{Extension, Query, State},
    response::Json,
};
use serde_json::Value;

use crate::app::AppState;
use crate::entity::SCHEDULE_DETAIL;
use crate::middleware::ApiResult;
use crate::session::Session;
use super::entity;
use super::params::ListQuery;

/// GET /api/schedule-detail - List schedule details grouped by schedule
///
/// `schedules` limits the parent schedules; unknown ones are reported in
/// `errors` and contribute nothing to the result.
pub async fn get(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<Value>> {
    entity::list(&SCHEDULE_DETAIL, &state, query, &session).await
}

/// POST /api/schedule-detail - The parent schedule must exist
pub async fn post(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(session): Extension<Session>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    entity::create(&SCHEDULE_DETAIL, &state, query, &session, payload).await
}

/// PUT /api/schedule-detail - Update by the `id` in the body
pub async fn put(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(session): Extension<Session>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    entity::update(&SCHEDULE_DETAIL, &state, query, &session, payload).await
}
