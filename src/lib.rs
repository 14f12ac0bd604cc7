/*!
 * # Upkeep API
 *
 * Backend for a maintenance-ticketing system. Requesters open tickets
 * against equipment or departments, mechanics move them through the
 * pending → in-progress → done lifecycle, and completed tickets get their
 * attached photos converted to a compact format. Administrators manage the
 * equipment and department catalogs.
 */

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::handlers::AppServices;

/// Requests carrying uploads may hold several images under the per-image cap.
const MAX_REQUEST_BODY_BYTES: usize = 32 * 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
    pub event_sender: EventSender,
}

/// Uniform success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}

/// Assembles the full application router.
pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", handlers::auth::auth_router())
        .nest("/users", handlers::users::users_router())
        .nest("/departments", handlers::departments::departments_router())
        .nest("/equipment", handlers::equipment::equipment_router())
        .nest("/tickets", handlers::tickets::tickets_router())
        .nest("/dashboards", handlers::dashboards::dashboards_router())
        .nest("/history", handlers::dashboards::history_router());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", api)
        .nest_service("/media", ServeDir::new(&state.config.media_root))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_response_success_skips_message() {
        let body = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(body, json!({"success": true, "data": 42}));
    }

    #[test]
    fn api_response_message_skips_data() {
        let body = serde_json::to_value(ApiResponse::<()>::message("ok")).unwrap();
        assert_eq!(body, json!({"success": true, "message": "ok"}));
    }
}
