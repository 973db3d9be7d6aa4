// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreFailure, SupabaseClient};

use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, NewAppointment, SchedulingError, SlotAssignment,
};
use crate::services::conflict::ConflictValidator;

/// Shared appointment storage.
///
/// `insert` and `relocate` are atomic check-and-write operations: two callers
/// racing for the same live slot cannot both succeed. `update_status` only
/// writes when the stored status still equals `expected`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError>;

    async fn get(&self, id: Uuid) -> Result<Appointment, SchedulingError>;

    async fn insert(
        &self,
        new: NewAppointment,
        assignment: SlotAssignment,
    ) -> Result<Appointment, SchedulingError>;

    async fn relocate(&self, id: Uuid, assignment: SlotAssignment) -> Result<Appointment, SchedulingError>;

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError>;
}

fn time_str(time: chrono::NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

// ==============================================================================
// SUPABASE-BACKED STORE
// ==============================================================================

/// PostgREST-backed store.
///
/// The `appointments` table carries partial unique indexes on
/// `(room_id, appointment_date, appointment_time)` and
/// `(doctor_id, appointment_date, appointment_time)` where
/// `status <> 'cancelled'`; a violation arrives as HTTP 409.
///
/// Those indexes make `OccupancyPolicy::StartInstant` atomic. For
/// `OccupancyPolicy::Interval` the table also needs `btree_gist` exclusion
/// constraints such as
/// `EXCLUDE USING gist (room_id WITH =, tsrange(appointment_date + appointment_time, appointment_date + coalesce(end_time, appointment_time + interval '30 minutes')) WITH &&) WHERE (status <> 'cancelled')`
/// (and the same on `doctor_id`). Without them the interval check in
/// `PlacementService::place` is a pre-check only. Exclusion violations
/// (`23P01`) also arrive as HTTP 409 and map to `SlotOccupied`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), auth_token)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    fn query_path(filter: &AppointmentFilter) -> String {
        let mut query_parts = vec!["select=*".to_string()];

        if let Some(room_id) = filter.room_id {
            query_parts.push(format!("room_id=eq.{}", room_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = filter.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(date) = filter.date {
            query_parts.push(format!("appointment_date=eq.{}", date));
        }
        if let Some(status) = filter.status {
            query_parts.push(format!("status=eq.{}", status));
        } else if filter.live_only {
            query_parts.push(format!("status=neq.{}", AppointmentStatus::Cancelled));
        }
        query_parts.push("order=appointment_date.asc,appointment_time.asc".to_string());

        format!("/rest/v1/appointments?{}", query_parts.join("&"))
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, SchedulingError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::store(format!("Failed to parse appointment: {}", e)))
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Value,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                method,
                path,
                Some(&self.auth_token),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| match StoreFailure::find(&e) {
                Some(StoreFailure::UniqueViolation(_)) => SchedulingError::SlotOccupied { occupant: None },
                _ => SchedulingError::store(e.to_string()),
            })?;

        Self::parse_rows(rows)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let path = Self::query_path(filter);
        debug!("Listing appointments: {}", path);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(|e| SchedulingError::store(e.to_string()))?;

        Self::parse_rows(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(|e| SchedulingError::store(e.to_string()))?;

        Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or(SchedulingError::AppointmentNotFound { id })
    }

    async fn insert(
        &self,
        new: NewAppointment,
        assignment: SlotAssignment,
    ) -> Result<Appointment, SchedulingError> {
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "id": Uuid::new_v4(),
            "patient_id": new.patient_id,
            "doctor_id": assignment.doctor_id,
            "room_id": assignment.room_id,
            "appointment_date": assignment.date.to_string(),
            "appointment_time": time_str(assignment.time),
            "end_time": new.end_time.map(time_str),
            "reason": new.reason,
            "notes": new.notes,
            "status": AppointmentStatus::Unconfirmed,
            "created_at": now,
            "updated_at": now,
        });

        let created = self.write(Method::POST, "/rest/v1/appointments", body).await?
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::store("Appointment insert returned no rows"))?;

        info!("Appointment {} created for patient {}", created.id, created.patient_id);
        Ok(created)
    }

    async fn relocate(&self, id: Uuid, assignment: SlotAssignment) -> Result<Appointment, SchedulingError> {
        let body = json!({
            "doctor_id": assignment.doctor_id,
            "room_id": assignment.room_id,
            "appointment_date": assignment.date.to_string(),
            "appointment_time": time_str(assignment.time),
            "updated_at": Utc::now().to_rfc3339(),
        });
        let path = format!("/rest/v1/appointments?id=eq.{}", id);

        self.write(Method::PATCH, &path, body).await?
            .into_iter()
            .next()
            .ok_or(SchedulingError::AppointmentNotFound { id })
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let body = json!({
            "status": new_status,
            "updated_at": Utc::now().to_rfc3339(),
        });
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected);

        if let Some(updated) = self.write(Method::PATCH, &path, body).await?.into_iter().next() {
            return Ok(updated);
        }

        // No row matched: either the appointment is gone or its status moved on.
        self.get(id).await?;
        warn!("Status of appointment {} changed underneath a {} -> {} update", id, expected, new_status);
        Err(SchedulingError::ConcurrentModification { id })
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Process-local store; every check-and-write happens under one lock.
pub struct InMemoryAppointmentStore {
    appointments: Mutex<Vec<Appointment>>,
    validator: ConflictValidator,
}

impl InMemoryAppointmentStore {
    pub fn new(validator: ConflictValidator) -> Self {
        Self::with_appointments(validator, Vec::new())
    }

    pub fn with_appointments(validator: ConflictValidator, appointments: Vec<Appointment>) -> Self {
        Self {
            appointments: Mutex::new(appointments),
            validator,
        }
    }

    pub async fn snapshot(&self) -> Vec<Appointment> {
        self.appointments.lock().await.clone()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let mut matching: Vec<Appointment> = self.appointments.lock().await
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matching.sort_by_key(|a| (a.appointment_date, a.appointment_time));
        Ok(matching)
    }

    async fn get(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.appointments.lock().await
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(SchedulingError::AppointmentNotFound { id })
    }

    async fn insert(
        &self,
        new: NewAppointment,
        assignment: SlotAssignment,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.lock().await;

        if let Some(occupant) = self.validator.find_for_assignment(&appointments, &assignment, new.end_time, None) {
            return Err(SchedulingError::SlotOccupied { occupant: Some(occupant.id) });
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: assignment.doctor_id,
            room_id: Some(assignment.room_id),
            appointment_date: assignment.date,
            appointment_time: assignment.time,
            end_time: new.end_time,
            reason: new.reason,
            notes: new.notes,
            status: AppointmentStatus::Unconfirmed,
            created_at: now,
            updated_at: now,
        };
        appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn relocate(&self, id: Uuid, assignment: SlotAssignment) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.lock().await;

        let end_time = appointments.iter()
            .find(|a| a.id == id)
            .ok_or(SchedulingError::AppointmentNotFound { id })?
            .end_time;
        if let Some(occupant) = self.validator.find_for_assignment(&appointments, &assignment, end_time, Some(id)) {
            return Err(SchedulingError::SlotOccupied { occupant: Some(occupant.id) });
        }

        let appointment = appointments.iter_mut()
            .find(|a| a.id == id)
            .ok_or(SchedulingError::AppointmentNotFound { id })?;
        appointment.apply(&assignment);
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments.iter_mut()
            .find(|a| a.id == id)
            .ok_or(SchedulingError::AppointmentNotFound { id })?;

        if appointment.status != expected {
            return Err(SchedulingError::ConcurrentModification { id });
        }
        appointment.status = new_status;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use shared_config::OccupancyPolicy;

    fn assignment(room_id: Uuid, doctor_id: Uuid, time: NaiveTime) -> SlotAssignment {
        SlotAssignment {
            doctor_id,
            room_id,
            date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            time,
        }
    }

    fn new_appointment() -> NewAppointment {
        NewAppointment { patient_id: Uuid::new_v4(), end_time: None, reason: None, notes: None }
    }

    #[test]
    fn query_path_encodes_filters() {
        let room = Uuid::new_v4();
        let filter = AppointmentFilter {
            room_id: Some(room),
            live_only: true,
            ..AppointmentFilter::default()
        };
        let path = SupabaseAppointmentStore::query_path(&filter);
        assert!(path.starts_with("/rest/v1/appointments?select=*"));
        assert!(path.contains(&format!("room_id=eq.{}", room)));
        assert!(path.contains("status=neq.cancelled"));
    }

    #[tokio::test]
    async fn insert_rejects_a_taken_slot() {
        let store = InMemoryAppointmentStore::new(ConflictValidator::new(OccupancyPolicy::StartInstant, 30));
        let room = Uuid::new_v4();
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();

        let first = store.insert(new_appointment(), assignment(room, Uuid::new_v4(), ten)).await.unwrap();
        assert_eq!(first.status, AppointmentStatus::Unconfirmed);

        let second = store.insert(new_appointment(), assignment(room, Uuid::new_v4(), ten)).await;
        assert_eq!(second.unwrap_err(), SchedulingError::SlotOccupied { occupant: Some(first.id) });
    }

    #[tokio::test]
    async fn status_update_is_compare_and_swap() {
        let store = InMemoryAppointmentStore::new(ConflictValidator::new(OccupancyPolicy::StartInstant, 30));
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let created = store.insert(new_appointment(), assignment(Uuid::new_v4(), Uuid::new_v4(), ten)).await.unwrap();

        store.update_status(created.id, AppointmentStatus::Unconfirmed, AppointmentStatus::Confirmed).await.unwrap();
        let stale = store.update_status(created.id, AppointmentStatus::Unconfirmed, AppointmentStatus::Cancelled).await;
        assert_eq!(stale.unwrap_err(), SchedulingError::ConcurrentModification { id: created.id });
        assert_eq!(store.get(created.id).await.unwrap().status, AppointmentStatus::Confirmed);
    }
}
