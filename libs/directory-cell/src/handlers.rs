// libs/directory-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AvailableDoctorsQuery, CreateScheduleEntryRequest};
use crate::services::{ScheduleService, SupabaseDirectory};

fn schedule_service(state: &AppConfig, token: &str) -> ScheduleService {
    ScheduleService::new(Arc::new(SupabaseDirectory::new(state, token)))
}

fn require_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only administrators can edit room schedules".to_string()));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn get_available_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailableDoctorsQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = schedule_service(&state, auth.token())
        .available_doctors(query.date)
        .await?;

    Ok(Json(json!({
        "date": query.date,
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_resource_schedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(resource_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = schedule_service(&state, auth.token())
        .resource_schedule(resource_id)
        .await?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn create_schedule_entry(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(room_id): Path<Uuid>,
    Json(request): Json<CreateScheduleEntryRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_admin(&user)?;

    let entry = schedule_service(&state, auth.token())
        .admit_entry(room_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "entry": entry
    }))))
}

#[axum::debug_handler]
pub async fn delete_schedule_entry(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((room_id, entry_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    require_admin(&user)?;

    schedule_service(&state, auth.token())
        .remove_entry(room_id, entry_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
