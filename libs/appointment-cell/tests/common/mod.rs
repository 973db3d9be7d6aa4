#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use appointment_cell::models::{
    Doctor, MedicalRecordEntry, NewAppointment, PlacementKind, PlacementRequest, Placed, Room,
    SchedulingError, SlotAssignment, WeeklyScheduleEntry,
};
use appointment_cell::services::{
    ConflictValidator, InMemoryAppointmentStore, InMemoryMedicalRecords, InMemoryOutbox,
    MedicalRecordSink, SchedulingEngine,
};
use directory_cell::InMemoryDirectory;
use shared_config::OccupancyPolicy;
use shared_models::auth::RequestContext;
use shared_utils::test_utils::TestUser;

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// 2025-01-06 is a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

pub fn ctx() -> RequestContext {
    TestUser::receptionist("desk@example.com").to_context()
}

pub fn doctor(name: &str, specialty: &str) -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        full_name: name.to_string(),
        specialty: specialty.to_string(),
        is_active: true,
        calendar_color: Some("#4f46e5".to_string()),
    }
}

fn binding(room_id: Uuid, doctor_id: Uuid, day: u8, start: NaiveTime, end: NaiveTime) -> WeeklyScheduleEntry {
    WeeklyScheduleEntry {
        id: Uuid::new_v4(),
        room_id,
        doctor_id,
        day_of_week: day,
        start_time: start,
        end_time: end,
    }
}

/// Sink that can be switched offline and counts delivery attempts.
#[derive(Default)]
pub struct FlakySink {
    pub offline: AtomicBool,
    pub attempts: AtomicUsize,
    pub delivered: Mutex<Vec<MedicalRecordEntry>>,
}

impl FlakySink {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl MedicalRecordSink for FlakySink {
    async fn create(&self, _ctx: &RequestContext, entry: &MedicalRecordEntry) -> Result<(), SchedulingError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(SchedulingError::SideEffectFailed {
                message: "medical records service unreachable".to_string(),
            });
        }
        let mut delivered = self.delivered.lock().await;
        if !delivered.iter().any(|e| e.id == entry.id) {
            delivered.push(entry.clone());
        }
        Ok(())
    }
}

/// Room R: Dr. Dana on Mondays 09:00-12:00.
/// Room S: Dr. Eli on Mondays 09:00-17:00.
pub struct Clinic {
    pub directory: Arc<InMemoryDirectory>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub outbox: Arc<InMemoryOutbox>,
    pub engine: SchedulingEngine,
    pub room_r: Room,
    pub room_s: Room,
    pub dana: Doctor,
    pub eli: Doctor,
}

impl Clinic {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(InMemoryMedicalRecords::new()))
    }

    pub fn with_sink(sink: Arc<dyn MedicalRecordSink>) -> Self {
        Self::build(sink, OccupancyPolicy::StartInstant)
    }

    pub fn with_policy(policy: OccupancyPolicy) -> Self {
        Self::build(Arc::new(InMemoryMedicalRecords::new()), policy)
    }

    fn build(sink: Arc<dyn MedicalRecordSink>, policy: OccupancyPolicy) -> Self {
        let dana = doctor("Dr. Dana", "Cardiology");
        let eli = doctor("Dr. Eli", "Dermatology");
        let room_r_id = Uuid::new_v4();
        let room_s_id = Uuid::new_v4();

        let room_r = Room {
            id: room_r_id,
            name: "Room R".to_string(),
            schedule: vec![binding(room_r_id, dana.id, 1, t(9, 0), t(12, 0))],
        };
        let room_s = Room {
            id: room_s_id,
            name: "Room S".to_string(),
            schedule: vec![binding(room_s_id, eli.id, 1, t(9, 0), t(17, 0))],
        };

        let validator = ConflictValidator::new(policy, 30);
        let directory = Arc::new(InMemoryDirectory::new(
            vec![dana.clone(), eli.clone()],
            vec![room_r.clone(), room_s.clone()],
        ));
        let store = Arc::new(InMemoryAppointmentStore::new(validator));
        let outbox = Arc::new(InMemoryOutbox::new());
        let engine = SchedulingEngine::new(directory.clone(), store.clone(), outbox.clone(), sink, validator);

        Self { directory, store, outbox, engine, room_r, room_s, dana, eli }
    }

    pub fn slot(&self, doctor: &Doctor, room: &Room, time: NaiveTime) -> SlotAssignment {
        SlotAssignment {
            doctor_id: doctor.id,
            room_id: room.id,
            date: monday(),
            time,
        }
    }

    pub async fn book(&self, doctor: &Doctor, room: &Room, time: NaiveTime) -> Result<Placed, SchedulingError> {
        let request = PlacementRequest {
            kind: PlacementKind::Create(NewAppointment {
                patient_id: Uuid::new_v4(),
                end_time: None,
                reason: Some("Follow-up".to_string()),
                notes: None,
            }),
            assignment: self.slot(doctor, room, time),
        };
        self.engine.placement.place(&ctx(), request).await
    }

    pub async fn relocate(&self, id: Uuid, assignment: SlotAssignment) -> Result<Placed, SchedulingError> {
        let request = PlacementRequest {
            kind: PlacementKind::Relocate(id),
            assignment,
        };
        self.engine.placement.place(&ctx(), request).await
    }
}
