// libs/appointment-cell/src/services/records.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreFailure, SupabaseClient};
use shared_models::auth::RequestContext;

use crate::models::{Appointment, Doctor, MedicalRecordEntry, SchedulingError};

/// The Medical Records collaborator.
///
/// `create` must be idempotent on the entry id.
#[async_trait]
pub trait MedicalRecordSink: Send + Sync {
    async fn create(&self, ctx: &RequestContext, entry: &MedicalRecordEntry) -> Result<(), SchedulingError>;
}

/// Derived entry for a completed visit.
pub fn compose_record(appointment: &Appointment, doctor: Option<&Doctor>, ctx: &RequestContext) -> MedicalRecordEntry {
    let title = match doctor {
        Some(doctor) => format!("Visit with {} ({})", doctor.full_name, doctor.specialty),
        None => "Clinic visit".to_string(),
    };

    let mut description = vec![format!(
        "Appointment on {} at {}",
        appointment.appointment_date,
        appointment.appointment_time.format("%H:%M")
    )];
    if let Some(reason) = appointment.reason.as_deref().filter(|r| !r.trim().is_empty()) {
        description.push(format!("Reason: {}", reason.trim()));
    }
    if let Some(notes) = appointment.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        description.push(format!("Notes: {}", notes.trim()));
    }

    MedicalRecordEntry {
        id: Uuid::new_v4(),
        patient_id: appointment.patient_id,
        doctor_id: appointment.doctor_id,
        appointment_id: appointment.id,
        title,
        description: description.join("\n"),
        visit_date: appointment.appointment_date,
        created_by: ctx.actor_id.clone(),
    }
}

pub struct SupabaseMedicalRecords {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseMedicalRecords {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), auth_token)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }
}

#[async_trait]
impl MedicalRecordSink for SupabaseMedicalRecords {
    async fn create(&self, ctx: &RequestContext, entry: &MedicalRecordEntry) -> Result<(), SchedulingError> {
        debug!("[{}] Creating medical record {} for appointment {}", ctx.request_id, entry.id, entry.appointment_id);

        let body = serde_json::to_value(entry)
            .map_err(|e| SchedulingError::SideEffectFailed { message: e.to_string() })?;

        let result: Result<Value, _> = self.supabase
            .request(Method::POST, "/rest/v1/medical_records", Some(&self.auth_token), Some(body))
            .await;

        match result {
            Ok(_) => {
                info!("Medical record {} created for patient {}", entry.id, entry.patient_id);
                Ok(())
            }
            Err(e) if matches!(StoreFailure::find(&e), Some(StoreFailure::UniqueViolation(_))) => {
                debug!("Medical record {} already exists", entry.id);
                Ok(())
            }
            Err(e) => Err(SchedulingError::SideEffectFailed { message: e.to_string() }),
        }
    }
}

/// Process-local sink keyed by entry id.
#[derive(Default)]
pub struct InMemoryMedicalRecords {
    entries: Mutex<Vec<MedicalRecordEntry>>,
}

impl InMemoryMedicalRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<MedicalRecordEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl MedicalRecordSink for InMemoryMedicalRecords {
    async fn create(&self, _ctx: &RequestContext, entry: &MedicalRecordEntry) -> Result<(), SchedulingError> {
        let mut entries = self.entries.lock().await;
        if !entries.iter().any(|e| e.id == entry.id) {
            entries.push(entry.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    use crate::models::AppointmentStatus;

    fn completed_visit() -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            room_id: Some(Uuid::new_v4()),
            appointment_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            appointment_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            end_time: None,
            reason: Some("Persistent cough".to_string()),
            notes: Some("  ".to_string()),
            status: AppointmentStatus::Completed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn record_names_doctor_and_reason() {
        let appointment = completed_visit();
        let doctor = Doctor {
            id: appointment.doctor_id,
            full_name: "Dr. Smith".to_string(),
            specialty: "Pulmonology".to_string(),
            is_active: true,
            calendar_color: None,
        };
        let ctx = RequestContext::new("staff-1", None);

        let record = compose_record(&appointment, Some(&doctor), &ctx);
        assert_eq!(record.title, "Visit with Dr. Smith (Pulmonology)");
        assert!(record.description.contains("Reason: Persistent cough"));
        assert!(!record.description.contains("Notes:"));
        assert_eq!(record.appointment_id, appointment.id);
        assert_eq!(record.created_by, "staff-1");
    }

    #[test]
    fn record_without_doctor_uses_generic_title() {
        let record = compose_record(&completed_visit(), None, &RequestContext::system());
        assert_eq!(record.title, "Clinic visit");
    }

    #[tokio::test]
    async fn in_memory_sink_is_idempotent() {
        let sink = InMemoryMedicalRecords::new();
        let ctx = RequestContext::system();
        let record = compose_record(&completed_visit(), None, &ctx);

        sink.create(&ctx, &record).await.unwrap();
        sink.create(&ctx, &record).await.unwrap();
        assert_eq!(sink.entries().await.len(), 1);
    }
}
