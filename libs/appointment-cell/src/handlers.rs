// libs/appointment-cell/src/handlers.rs
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
use shared_models::auth::{RequestContext, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentFilter, AppointmentStatus, BoardQuery, CreateAppointmentRequest, NewAppointment,
    PlacementKind, PlacementRequest, RelocateAppointmentRequest, SlotAssignment, StatusUpdateRequest,
};
use crate::services::{SchedulingEngine, StatusWorkflow};

fn engine(state: &AppConfig, token: &str) -> SchedulingEngine {
    SchedulingEngine::supabase(state, token)
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Value>, AppError> {
    let appointments = engine(&state, auth.token()).placement.list(&filter).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = engine(&state, auth.token()).placement.get(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let placement = PlacementRequest {
        kind: PlacementKind::Create(NewAppointment {
            patient_id: request.patient_id,
            end_time: request.end_time,
            reason: request.reason,
            notes: request.notes,
        }),
        assignment: SlotAssignment {
            doctor_id: request.doctor_id,
            room_id: request.room_id,
            date: request.appointment_date,
            time: request.appointment_time,
        },
    };

    let placed = engine(&state, auth.token()).placement.place(&ctx, placement).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": placed.appointment
    }))))
}

#[axum::debug_handler]
pub async fn relocate_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RelocateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let placement = PlacementRequest {
        kind: PlacementKind::Relocate(appointment_id),
        assignment: SlotAssignment {
            doctor_id: request.doctor_id,
            room_id: request.room_id,
            date: request.appointment_date,
            time: request.appointment_time,
        },
    };

    let placed = engine(&state, auth.token()).placement.place(&ctx, placement).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": placed.appointment,
        "changed": placed.changed
    })))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(ctx): Extension<RequestContext>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = engine(&state, auth.token())
        .workflow
        .transition(&ctx, appointment_id, request.status)
        .await?;

    let warnings: Vec<String> = outcome.warnings.iter().map(|w| w.to_string()).collect();
    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "previous_status": outcome.previous_status,
        "badge": outcome.appointment.status.badge(),
        "warnings": warnings
    })))
}

#[axum::debug_handler]
pub async fn get_allowed_transitions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = engine(&state, auth.token()).placement.get(appointment_id).await?;
    let allowed: Vec<_> = StatusWorkflow::allowed_transitions(appointment.status)
        .into_iter()
        .map(|status| status.badge())
        .collect();

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "status": appointment.status,
        "allowed": allowed
    })))
}

#[axum::debug_handler]
pub async fn get_board(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = engine(&state, auth.token())
        .placement
        .board(query.room_id, query.date)
        .await?;

    Ok(Json(json!({
        "room_id": query.room_id,
        "date": query.date,
        "granularity_minutes": state.slot_granularity_minutes,
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn get_statuses() -> Json<Value> {
    let badges: Vec<_> = AppointmentStatus::ALL.iter().map(|s| s.badge()).collect();
    Json(json!({ "statuses": badges }))
}

#[axum::debug_handler]
pub async fn drain_outbox(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only administrators can retry side effects".to_string()));
    }

    let report = engine(&state, auth.token()).workflow.relay().drain(&ctx).await?;
    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}
