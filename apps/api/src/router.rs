use std::sync::Arc;

use axum::{
    Json,
    Router,
    routing::get,
};
use serde_json::json;

use appointment_cell::router::appointment_routes;
use directory_cell::router::directory_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let configured = state.is_configured();

    Router::new()
        .route("/", get(|| async { "Clinic front-desk API is running!" }))
        .route("/health", get(move || async move {
            Json(json!({ "status": "ok", "backend_configured": configured }))
        }))
        .nest("/directory", directory_routes(state.clone()))
        .nest("/appointments", appointment_routes(state))
}
