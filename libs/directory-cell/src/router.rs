use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn directory_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/available-doctors", get(handlers::get_available_doctors))
        .route("/resources/{resource_id}/schedule", get(handlers::get_resource_schedule))
        .route("/rooms/{room_id}/schedule", post(handlers::create_schedule_entry))
        .route("/rooms/{room_id}/schedule/{entry_id}", delete(handlers::delete_schedule_entry))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
