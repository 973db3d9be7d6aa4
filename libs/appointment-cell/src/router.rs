use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::create_appointment))
        .route("/board", get(handlers::get_board))
        .route("/statuses", get(handlers::get_statuses))
        .route("/outbox/drain", post(handlers::drain_outbox))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/placement", put(handlers::relocate_appointment))
        .route("/{appointment_id}/status", put(handlers::update_status))
        .route("/{appointment_id}/transitions", get(handlers::get_allowed_transitions))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
