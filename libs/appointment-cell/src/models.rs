// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use directory_cell::models::{day_of_week, Doctor, Room, WeeklyScheduleEntry};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// Absent for appointments booked outside the room view.
    pub room_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Live appointments hold their slot; only cancellation releases it.
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    pub fn assignment(&self) -> Option<SlotAssignment> {
        self.room_id.map(|room_id| SlotAssignment {
            doctor_id: self.doctor_id,
            room_id,
            date: self.appointment_date,
            time: self.appointment_time,
        })
    }

    pub fn is_at(&self, assignment: &SlotAssignment) -> bool {
        self.assignment().as_ref() == Some(assignment)
    }

    pub fn apply(&mut self, assignment: &SlotAssignment) {
        self.doctor_id = assignment.doctor_id;
        self.room_id = Some(assignment.room_id);
        self.appointment_date = assignment.date;
        self.appointment_time = assignment.time;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Unconfirmed,
    Confirmed,
    Arrived,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::Unconfirmed,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Arrived,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Unconfirmed => "unconfirmed",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Arrived => "arrived",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self,
            AppointmentStatus::Completed |
            AppointmentStatus::Cancelled |
            AppointmentStatus::NoShow
        )
    }

    pub fn is_live(&self) -> bool {
        *self != AppointmentStatus::Cancelled
    }

    /// Dashboard presentation for the status.
    pub fn badge(&self) -> StatusBadge {
        let (label, color, icon) = match self {
            AppointmentStatus::Unconfirmed => ("Unconfirmed", "#9ca3af", "help-circle"),
            AppointmentStatus::Confirmed => ("Confirmed", "#3b82f6", "check-circle"),
            AppointmentStatus::Arrived => ("Arrived", "#8b5cf6", "log-in"),
            AppointmentStatus::InProgress => ("In progress", "#f59e0b", "activity"),
            AppointmentStatus::Completed => ("Completed", "#10b981", "check-square"),
            AppointmentStatus::Cancelled => ("Cancelled", "#ef4444", "x-circle"),
            AppointmentStatus::NoShow => ("No show", "#6b7280", "user-x"),
        };
        StatusBadge { status: *self, label, color, icon }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| SchedulingError::invalid(format!("Unknown appointment status '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub status: AppointmentStatus,
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

// ==============================================================================
// RESOURCES AND SLOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
    Room(Uuid),
    Doctor(Uuid),
}

impl ResourceRef {
    /// Whether the appointment is booked on this resource's column.
    pub fn holds(&self, appointment: &Appointment) -> bool {
        match self {
            ResourceRef::Room(id) => appointment.room_id == Some(*id),
            ResourceRef::Doctor(id) => appointment.doctor_id == *id,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Room(id) => write!(f, "room {}", id),
            ResourceRef::Doctor(id) => write!(f, "doctor {}", id),
        }
    }
}

/// The `(doctor, room, date, time)` tuple a placement commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

// ==============================================================================
// PLACEMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PlacementKind {
    Create(NewAppointment),
    Relocate(Uuid),
}

#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub kind: PlacementKind,
    pub assignment: SlotAssignment,
}

#[derive(Debug, Clone, Serialize)]
pub struct Placed {
    pub appointment: Appointment,
    /// False when a relocation targeted the slot the appointment already held.
    pub changed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub room_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub live_only: bool,
}

impl AppointmentFilter {
    pub fn live_on(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            live_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.room_id.map_or(true, |id| appointment.room_id == Some(id))
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.date.map_or(true, |d| appointment.appointment_date == d)
            && self.status.map_or(true, |s| appointment.status == s)
            && (!self.live_only || appointment.is_live())
    }
}

// ==============================================================================
// WORKFLOW MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub appointment: Appointment,
    pub previous_status: AppointmentStatus,
    /// Non-fatal problems; the status change stands regardless.
    pub warnings: Vec<SchedulingError>,
}

/// Medical-record entry derived from a completed visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecordEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Uuid,
    pub title: String,
    pub description: String,
    pub visit_date: NaiveDate,
    pub created_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectStatus {
    Pending,
    Delivered,
}

/// Outbox record of work owed to another module after a status commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSideEffect {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub status: SideEffectStatus,
    pub payload: MedicalRecordEntry,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingSideEffect {
    pub fn medical_record(payload: MedicalRecordEntry) -> Self {
        let now = Utc::now();
        Self {
            // The record reuses this id so redelivery stays idempotent.
            id: payload.id,
            appointment_id: payload.appointment_id,
            status: SideEffectStatus::Pending,
            payload,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
    pub discarded: usize,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocateAppointmentRequest {
    pub doctor_id: Uuid,
    pub room_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardQuery {
    pub room_id: Uuid,
    pub date: NaiveDate,
}

/// One row of a room's day view.
#[derive(Debug, Clone, Serialize)]
pub struct BoardSlot {
    pub time: NaiveTime,
    pub doctor: Option<Doctor>,
    pub appointment: Option<Appointment>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulingError {
    #[error("No doctor scheduled in room {room_id} on {date} at {time} matches the request")]
    NoAvailableDoctor { room_id: Uuid, date: NaiveDate, time: NaiveTime },

    #[error("Slot already taken{}", .occupant.map(|id| format!(" by appointment {}", id)).unwrap_or_default())]
    SlotOccupied { occupant: Option<Uuid> },

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Side effect failed: {message}")]
    SideEffectFailed { message: String },

    #[error("Appointment {id} not found")]
    AppointmentNotFound { id: Uuid },

    #[error("Appointment {id} was modified concurrently")]
    ConcurrentModification { id: Uuid },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Store error: {message}")]
    Store { message: String },
}

impl SchedulingError {
    pub fn store(message: impl Into<String>) -> Self {
        SchedulingError::Store { message: message.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        SchedulingError::InvalidRequest { message: message.into() }
    }
}

impl From<directory_cell::DirectoryError> for SchedulingError {
    fn from(err: directory_cell::DirectoryError) -> Self {
        SchedulingError::store(err.to_string())
    }
}

impl From<SchedulingError> for shared_models::error::AppError {
    fn from(err: SchedulingError) -> Self {
        use shared_models::error::AppError;

        let message = err.to_string();
        match err {
            SchedulingError::NoAvailableDoctor { .. } |
            SchedulingError::InvalidTransition { .. } => AppError::Unprocessable(message),
            SchedulingError::SlotOccupied { .. } |
            SchedulingError::ConcurrentModification { .. } => AppError::Conflict(message),
            SchedulingError::AppointmentNotFound { .. } => AppError::NotFound(message),
            SchedulingError::InvalidRequest { .. } => AppError::BadRequest(message),
            SchedulingError::SideEffectFailed { .. } |
            SchedulingError::Store { .. } => AppError::ExternalService(message),
        }
    }
}
