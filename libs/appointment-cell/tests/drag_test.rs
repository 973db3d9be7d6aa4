mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::models::{Appointment, SchedulingError, WeeklyScheduleEntry};
use appointment_cell::services::{AppointmentStore, DragRelocationCoordinator, DragState, DropTarget, HoverFeedback};

use directory_cell::Directory;

use common::{ctx, monday, t, Clinic};

async fn coordinator(clinic: &Clinic) -> DragRelocationCoordinator {
    DragRelocationCoordinator::load(clinic.engine.placement.clone(), monday()).await.unwrap()
}

fn room_target(room_id: Uuid, h: u32, m: u32) -> DropTarget {
    DropTarget::Room { room_id, date: monday(), time: t(h, m) }
}

fn shown<'a>(drag: &'a DragRelocationCoordinator, id: Uuid) -> &'a Appointment {
    drag.appointments().iter().find(|a| a.id == id).unwrap()
}

#[tokio::test]
async fn test_drop_on_origin_is_a_no_op() {
    let clinic = Clinic::new();
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(10, 0)).await.unwrap().appointment;
    let before = clinic.store.snapshot().await;
    let mut drag = coordinator(&clinic).await;

    drag.begin(booked.id).unwrap();
    assert_eq!(drag.hover(room_target(clinic.room_r.id, 10, 0)), Some(HoverFeedback::SameSlot));

    let placed = drag.drop(&ctx(), room_target(clinic.room_r.id, 10, 0)).await.unwrap();

    assert!(!placed.changed);
    assert_eq!(placed.appointment, booked);
    assert_eq!(drag.state(), &DragState::Completed(booked.clone()));
    assert_eq!(clinic.store.snapshot().await, before);
}

#[tokio::test]
async fn test_drop_on_origin_after_room_is_rebound_keeps_the_doctor() {
    let clinic = Clinic::new();
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(10, 0)).await.unwrap().appointment;

    // Room R's Monday block is handed to Dr. Eli after the booking
    let old_entry = clinic.room_r.schedule[0].clone();
    clinic.directory.delete_schedule_entry(clinic.room_r.id, old_entry.id).await.unwrap();
    clinic.directory
        .insert_schedule_entry(WeeklyScheduleEntry {
            id: Uuid::new_v4(),
            doctor_id: clinic.eli.id,
            ..old_entry
        })
        .await
        .unwrap();
    let before = clinic.store.snapshot().await;
    let mut drag = coordinator(&clinic).await;

    drag.begin(booked.id).unwrap();
    assert_eq!(drag.hover(room_target(clinic.room_r.id, 10, 0)), Some(HoverFeedback::SameSlot));
    let placed = drag.drop(&ctx(), room_target(clinic.room_r.id, 10, 0)).await.unwrap();

    assert!(!placed.changed);
    assert_eq!(placed.appointment.doctor_id, clinic.dana.id);
    assert_eq!(clinic.store.snapshot().await, before);
}

#[tokio::test]
async fn test_drop_on_origin_with_deactivated_doctor_is_a_no_op() {
    let clinic = Clinic::new();
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(10, 0)).await.unwrap().appointment;
    let mut away = clinic.dana.clone();
    away.is_active = false;
    let mut drag = DragRelocationCoordinator::new(
        clinic.engine.placement.clone(),
        vec![booked.clone()],
        vec![clinic.room_r.clone(), clinic.room_s.clone()],
        vec![away, clinic.eli.clone()],
    );

    drag.begin(booked.id).unwrap();
    let placed = drag.drop(&ctx(), room_target(clinic.room_r.id, 10, 0)).await.unwrap();
    assert!(!placed.changed);
    assert_eq!(placed.appointment, booked);

    drag.begin(booked.id).unwrap();
    let column = DropTarget::Doctor { doctor_id: clinic.dana.id, date: monday(), time: t(10, 0) };
    assert_eq!(drag.hover(column), Some(HoverFeedback::SameSlot));
    assert!(!drag.drop(&ctx(), column).await.unwrap().changed);
}

#[tokio::test]
async fn test_hover_reports_local_feedback() {
    let clinic = Clinic::new();
    let dragged = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;
    let blocker = clinic.book(&clinic.dana, &clinic.room_r, t(9, 30)).await.unwrap().appointment;
    let mut drag = coordinator(&clinic).await;

    assert_eq!(drag.hover(room_target(clinic.room_r.id, 10, 0)), None);

    drag.begin(dragged.id).unwrap();
    assert_eq!(drag.hover(room_target(clinic.room_r.id, 10, 0)), Some(HoverFeedback::Free));
    assert_eq!(drag.hover(room_target(clinic.room_r.id, 9, 30)), Some(HoverFeedback::Occupied(blocker.id)));
    assert_eq!(drag.hover(room_target(clinic.room_r.id, 14, 0)), Some(HoverFeedback::NoDoctor));

    let doctor_column = DropTarget::Doctor { doctor_id: clinic.eli.id, date: monday(), time: t(14, 0) };
    assert_eq!(drag.hover(doctor_column), Some(HoverFeedback::Free));
}

#[tokio::test]
async fn test_successful_drop_updates_board_and_store() {
    let clinic = Clinic::new();
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;
    let mut drag = coordinator(&clinic).await;

    drag.begin(booked.id).unwrap();
    let placed = drag.drop(&ctx(), room_target(clinic.room_s.id, 13, 0)).await.unwrap();

    assert!(placed.changed);
    assert_eq!(placed.appointment.doctor_id, clinic.eli.id);
    assert_eq!(shown(&drag, booked.id).room_id, Some(clinic.room_s.id));
    assert_eq!(clinic.store.get(booked.id).await.unwrap().appointment_time, t(13, 0));
    assert_matches!(drag.state(), DragState::Completed(a) if a.id == booked.id);
}

#[tokio::test]
async fn test_drop_on_doctor_column_uses_the_doctors_room() {
    let clinic = Clinic::new();
    let booked = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;
    let mut drag = coordinator(&clinic).await;

    drag.begin(booked.id).unwrap();
    let target = DropTarget::Doctor { doctor_id: clinic.eli.id, date: monday(), time: t(16, 0) };
    let placed = drag.drop(&ctx(), target).await.unwrap();

    assert_eq!(placed.appointment.room_id, Some(clinic.room_s.id));
    assert_eq!(placed.appointment.doctor_id, clinic.eli.id);
}

#[tokio::test]
async fn test_failed_drop_rolls_back_to_original_slot() {
    let clinic = Clinic::new();
    let dragged = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;
    // The board is loaded before someone else takes 11:00
    let mut drag = coordinator(&clinic).await;
    let rival = clinic.book(&clinic.dana, &clinic.room_r, t(11, 0)).await.unwrap().appointment;

    drag.begin(dragged.id).unwrap();
    assert_eq!(drag.hover(room_target(clinic.room_r.id, 11, 0)), Some(HoverFeedback::Free));

    let result = drag.drop(&ctx(), room_target(clinic.room_r.id, 11, 0)).await;

    assert_matches!(result, Err(SchedulingError::SlotOccupied { occupant: Some(id) }) if id == rival.id);
    assert_eq!(shown(&drag, dragged.id), &dragged);
    assert_eq!(drag.state(), &DragState::Idle);
    assert_eq!(clinic.store.get(dragged.id).await.unwrap().appointment_time, t(9, 0));
}

#[tokio::test]
async fn test_drop_where_no_doctor_works_is_rejected() {
    let clinic = Clinic::new();
    let dragged = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;
    let mut drag = coordinator(&clinic).await;

    drag.begin(dragged.id).unwrap();
    let result = drag.drop(&ctx(), room_target(clinic.room_r.id, 15, 0)).await;

    assert_matches!(result, Err(SchedulingError::NoAvailableDoctor { .. }));
    assert_eq!(shown(&drag, dragged.id), &dragged);
}

#[tokio::test]
async fn test_cancel_restores_state_without_store_contact() {
    let clinic = Clinic::new();
    let dragged = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;
    let before = clinic.store.snapshot().await;
    let mut drag = coordinator(&clinic).await;

    drag.begin(dragged.id).unwrap();
    drag.cancel();

    assert_eq!(drag.state(), &DragState::Cancelled);
    assert_eq!(shown(&drag, dragged.id), &dragged);
    assert_eq!(clinic.store.snapshot().await, before);
    assert_matches!(drag.drop(&ctx(), room_target(clinic.room_r.id, 10, 0)).await, Err(SchedulingError::InvalidRequest { .. }));
}

#[tokio::test]
async fn test_only_one_drag_at_a_time() {
    let clinic = Clinic::new();
    let a = clinic.book(&clinic.dana, &clinic.room_r, t(9, 0)).await.unwrap().appointment;
    let b = clinic.book(&clinic.dana, &clinic.room_r, t(9, 30)).await.unwrap().appointment;
    let mut drag = coordinator(&clinic).await;

    drag.begin(a.id).unwrap();
    assert_matches!(drag.begin(b.id), Err(SchedulingError::InvalidRequest { .. }));
    assert_matches!(drag.begin(Uuid::new_v4()), Err(SchedulingError::InvalidRequest { .. }));

    drag.cancel();
    let missing = Uuid::new_v4();
    assert_eq!(drag.begin(missing), Err(SchedulingError::AppointmentNotFound { id: missing }));
}
