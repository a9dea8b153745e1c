use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::middleware::ApiResponse;

/// GET / - Service description
pub async fn root() -> impl IntoResponse {
    ApiResponse::success(json!({
        "name": "Schedule API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health (public)",
            "registration": "POST /api/registration (public)",
            "login": "POST /api/login (public)",
            "logout": "POST /api/logout (X-AccessToken optional)",
            "user": "GET|POST|PUT /api/user?ids=&fields=&name= (session; writes need admin)",
            "schedule": "GET|POST|PUT /api/schedule?ids=&fields=&name= (session)",
            "schedule_detail": "GET|POST|PUT /api/schedule-detail?ids=&fields=&schedules=&name= (session)",
        },
    }))
}

/// GET /health - Storage connectivity check
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.storage.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "result": {"status": "ok", "timestamp": now, "database": "ok"},
                "errors": [],
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "result": {"status": "degraded", "timestamp": now},
                    "errors": [{"selector": "database", "reason": "database unavailable"}],
                })),
            )
        }
    }
}
