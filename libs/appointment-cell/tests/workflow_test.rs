mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentFilter, AppointmentStatus, DrainReport, NewAppointment, PendingSideEffect,
    SchedulingError, SideEffectStatus, SlotAssignment,
};
use appointment_cell::services::{
    compose_record, AppointmentStore, InMemoryOutbox, SideEffectOutbox, StatusWorkflow,
};

use common::{ctx, t, Clinic, FlakySink};

#[tokio::test]
async fn test_completing_a_visit_creates_one_medical_record() {
    let sink = Arc::new(FlakySink::default());
    let clinic = Clinic::with_sink(sink.clone());
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(9, 30)).await.unwrap().appointment;
    let workflow = &clinic.engine.workflow;

    workflow.transition(&ctx(), booked.id, AppointmentStatus::Confirmed).await.unwrap();
    let outcome = workflow.transition(&ctx(), booked.id, AppointmentStatus::Completed).await.unwrap();

    assert_eq!(outcome.previous_status, AppointmentStatus::Confirmed);
    assert_eq!(outcome.appointment.status, AppointmentStatus::Completed);
    assert!(outcome.warnings.is_empty());

    let delivered = sink.delivered.lock().await.clone();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].appointment_id, booked.id);
    assert_eq!(delivered[0].patient_id, booked.patient_id);
    assert_eq!(delivered[0].title, "Visit with Dr. Dana (Cardiology)");
    assert!(delivered[0].description.contains("Reason: Follow-up"));

    let outbox = clinic.outbox.all().await;
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].status, SideEffectStatus::Delivered);
}

#[tokio::test]
async fn test_unreachable_records_service_keeps_completion() {
    let sink = Arc::new(FlakySink::default());
    sink.set_offline(true);
    let clinic = Clinic::with_sink(sink.clone());
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(10, 0)).await.unwrap().appointment;
    let workflow = &clinic.engine.workflow;
    workflow.transition(&ctx(), booked.id, AppointmentStatus::Confirmed).await.unwrap();

    let outcome = workflow.transition(&ctx(), booked.id, AppointmentStatus::Completed).await.unwrap();

    assert_eq!(outcome.appointment.status, AppointmentStatus::Completed);
    assert_matches!(outcome.warnings.as_slice(), [SchedulingError::SideEffectFailed { .. }]);
    assert_eq!(clinic.store.get(booked.id).await.unwrap().status, AppointmentStatus::Completed);

    let pending = clinic.outbox.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].attempts, 1);
    assert!(pending[0].last_error.as_deref().unwrap_or_default().contains("unreachable"));
}

#[tokio::test]
async fn test_drain_delivers_once_the_service_recovers() {
    let sink = Arc::new(FlakySink::default());
    sink.set_offline(true);
    let clinic = Clinic::with_sink(sink.clone());
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(10, 30)).await.unwrap().appointment;
    let workflow = &clinic.engine.workflow;
    workflow.transition(&ctx(), booked.id, AppointmentStatus::Completed).await.unwrap();

    let still_down = workflow.relay().drain(&ctx()).await.unwrap();
    assert_eq!(still_down, DrainReport { delivered: 0, failed: 1, discarded: 0 });
    assert_eq!(clinic.outbox.pending().await.unwrap()[0].attempts, 2);

    sink.set_offline(false);
    let report = workflow.relay().drain(&ctx()).await.unwrap();

    assert_eq!(report, DrainReport { delivered: 1, failed: 0, discarded: 0 });
    assert!(clinic.outbox.pending().await.unwrap().is_empty());
    assert_eq!(sink.delivered.lock().await.len(), 1);
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);

    let idle = workflow.relay().drain(&ctx()).await.unwrap();
    assert_eq!(idle, DrainReport::default());
}

#[tokio::test]
async fn test_cancelled_appointment_cannot_be_reconfirmed() {
    let clinic = Clinic::new();
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(11, 0)).await.unwrap().appointment;
    let workflow = &clinic.engine.workflow;
    workflow.transition(&ctx(), booked.id, AppointmentStatus::Cancelled).await.unwrap();

    let result = workflow.transition(&ctx(), booked.id, AppointmentStatus::Confirmed).await;

    assert_eq!(result.unwrap_err(), SchedulingError::InvalidTransition {
        from: AppointmentStatus::Cancelled,
        to: AppointmentStatus::Confirmed,
    });
    assert_eq!(clinic.store.get(booked.id).await.unwrap().status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn test_terminal_statuses_accept_no_transition() {
    let clinic = Clinic::new();
    let workflow = &clinic.engine.workflow;

    for (i, terminal) in [AppointmentStatus::Completed, AppointmentStatus::Cancelled, AppointmentStatus::NoShow]
        .into_iter()
        .enumerate()
    {
        let time = [t(9, 0), t(9, 30), t(10, 0)][i];
        let booked = clinic.book(&clinic.dana, &clinic.room_r, time).await.unwrap().appointment;
        workflow.transition(&ctx(), booked.id, terminal).await.unwrap();

        for target in AppointmentStatus::ALL {
            let result = workflow.transition(&ctx(), booked.id, target).await;
            assert_matches!(result, Err(SchedulingError::InvalidTransition { .. }));
        }
        assert_eq!(clinic.store.get(booked.id).await.unwrap().status, terminal);
    }
}

#[tokio::test]
async fn test_skip_and_self_transitions() {
    let clinic = Clinic::new();
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;
    let workflow = &clinic.engine.workflow;

    let same = workflow.transition(&ctx(), booked.id, AppointmentStatus::Unconfirmed).await.unwrap();
    assert_eq!(same.appointment, booked);

    let skipped = workflow.transition(&ctx(), booked.id, AppointmentStatus::InProgress).await.unwrap();
    assert_eq!(skipped.appointment.status, AppointmentStatus::InProgress);

    let backwards = workflow.transition(&ctx(), booked.id, AppointmentStatus::Confirmed).await;
    assert_matches!(backwards, Err(SchedulingError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_unknown_appointment_is_reported() {
    let clinic = Clinic::new();
    let id = Uuid::new_v4();

    let result = clinic.engine.workflow.transition(&ctx(), id, AppointmentStatus::Confirmed).await;
    assert_eq!(result.unwrap_err(), SchedulingError::AppointmentNotFound { id });
}

/// Store whose status writes always lose the race.
struct RacingStore {
    inner: Arc<dyn AppointmentStore>,
}

#[async_trait]
impl AppointmentStore for RacingStore {
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        self.inner.list(filter).await
    }

    async fn get(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.inner.get(id).await
    }

    async fn insert(&self, new: NewAppointment, assignment: SlotAssignment) -> Result<Appointment, SchedulingError> {
        self.inner.insert(new, assignment).await
    }

    async fn relocate(&self, id: Uuid, assignment: SlotAssignment) -> Result<Appointment, SchedulingError> {
        self.inner.relocate(id, assignment).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        _expected: AppointmentStatus,
        _new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        Err(SchedulingError::ConcurrentModification { id })
    }
}

#[tokio::test]
async fn test_lost_status_race_discards_the_outbox_record() {
    let clinic = Clinic::new();
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;

    let sink = Arc::new(FlakySink::default());
    let outbox = Arc::new(InMemoryOutbox::new());
    let workflow = StatusWorkflow::new(
        Arc::new(RacingStore { inner: clinic.store.clone() }),
        clinic.directory.clone(),
        outbox.clone(),
        sink.clone(),
    );

    let result = workflow.transition(&ctx(), booked.id, AppointmentStatus::Completed).await;

    assert_eq!(result.unwrap_err(), SchedulingError::ConcurrentModification { id: booked.id });
    assert!(outbox.all().await.is_empty());
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(clinic.store.get(booked.id).await.unwrap().status, AppointmentStatus::Unconfirmed);
}

#[tokio::test]
async fn test_drain_discards_records_of_reopened_or_missing_appointments() {
    let clinic = Clinic::new();
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;

    let reopened = PendingSideEffect::medical_record(compose_record(&booked, None, &ctx()));
    clinic.outbox.enqueue(reopened).await.unwrap();

    let mut orphan = PendingSideEffect::medical_record(compose_record(&booked, None, &ctx()));
    orphan.appointment_id = Uuid::new_v4();
    clinic.outbox.enqueue(orphan).await.unwrap();

    let report = clinic.engine.workflow.relay().drain(&ctx()).await.unwrap();

    assert_eq!(report, DrainReport { delivered: 0, failed: 0, discarded: 2 });
    assert!(clinic.outbox.all().await.is_empty());
}
