use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::AuthModel;
use crate::config::AppConfig;
use crate::database::Storage;
use crate::handlers::{protected, public};
use crate::middleware::session_middleware;
use crate::session::SessionStore;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub sessions: SessionStore,
    pub auth: AuthModel,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, config: &AppConfig) -> Self {
        let sessions = SessionStore::with_ttl_hours(config.security.session_ttl_hours);
        let auth = AuthModel::new(storage.clone(), sessions.clone(), config.security.min_password_length);
        Self { storage, sessions, auth }
    }
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    let app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(auth_public_routes())
        // Session required
        .merge(entity_routes(state.clone()))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    let app = match cors_layer(config) {
        Some(cors) => app.layer(cors),
        None => app,
    };
    let app = if config.api.enable_request_logging {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    };

    app.with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/registration", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
}

fn entity_routes(state: AppState) -> Router<AppState> {
    use protected::{schedule, schedule_detail, user};

    Router::new()
        .route("/api/user", get(user::get).post(user::post).put(user::put))
        .route("/api/schedule", get(schedule::get).post(schedule::post).put(schedule::put))
        .route(
            "/api/schedule-detail",
            get(schedule_detail::get).post(schedule_detail::post).put(schedule_detail::put),
        )
        .route_layer(middleware::from_fn_with_state(state, session_middleware))
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    if !config.security.enable_cors {
        return None;
    }
    let origins = &config.security.cors_origins;
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    Some(CorsLayer::permissive().allow_origin(allowed))
}
