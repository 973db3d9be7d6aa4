// libs/appointment-cell/src/services/drag.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::RequestContext;

use crate::models::{
    Appointment, AppointmentFilter, Doctor, PlacementKind, PlacementRequest, Placed, Room,
    SchedulingError, SlotAssignment,
};
use crate::services::availability::AvailabilityResolver;
use crate::services::calendar::Resource;
use crate::services::placement::PlacementService;

/// Where a dragged appointment is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// A room column; the doctor comes from the room calendar.
    Room { room_id: Uuid, date: NaiveDate, time: NaiveTime },
    /// A doctor column; the room is wherever the doctor is on duty.
    Doctor { doctor_id: Uuid, date: NaiveDate, time: NaiveTime },
}

impl DropTarget {
    /// Whether the target is the cell the appointment already sits in,
    /// judged on the board coordinate alone.
    pub fn is_origin_of(&self, appointment: &Appointment) -> bool {
        match *self {
            DropTarget::Room { room_id, date, time } => {
                appointment.room_id == Some(room_id)
                    && appointment.appointment_date == date
                    && appointment.appointment_time == time
            }
            DropTarget::Doctor { doctor_id, date, time } => {
                appointment.doctor_id == doctor_id
                    && appointment.appointment_date == date
                    && appointment.appointment_time == time
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSource {
    /// The appointment as it was when the gesture started.
    pub original: Appointment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging(DragSource),
    Completed(Appointment),
    Cancelled,
}

/// Local, advisory answer while hovering; `drop` re-checks authoritatively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverFeedback {
    SameSlot,
    Free,
    Occupied(Uuid),
    NoDoctor,
}

/// Drives one board's drag gesture: begin, hover, then drop or cancel.
pub struct DragRelocationCoordinator {
    placement: Arc<PlacementService>,
    appointments: Vec<Appointment>,
    rooms: Vec<Room>,
    resolver: AvailabilityResolver,
    state: DragState,
}

impl DragRelocationCoordinator {
    pub fn new(
        placement: Arc<PlacementService>,
        appointments: Vec<Appointment>,
        rooms: Vec<Room>,
        doctors: Vec<Doctor>,
    ) -> Self {
        Self {
            placement,
            appointments,
            rooms,
            resolver: AvailabilityResolver::new(doctors),
            state: DragState::Idle,
        }
    }

    /// Coordinator over the live appointments of `date`.
    pub async fn load(placement: Arc<PlacementService>, date: NaiveDate) -> Result<Self, SchedulingError> {
        let directory = placement.directory().clone();
        let rooms = directory.rooms().await?;
        let doctors = directory.doctors().await?;
        let appointments = placement.list(&AppointmentFilter::live_on(date)).await?;
        Ok(Self::new(placement, appointments, rooms, doctors))
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// The local board as currently displayed.
    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn begin(&mut self, appointment_id: Uuid) -> Result<(), SchedulingError> {
        if matches!(self.state, DragState::Dragging(_)) {
            return Err(SchedulingError::invalid("A drag is already in progress"));
        }
        let original = self.appointments.iter()
            .find(|a| a.id == appointment_id)
            .cloned()
            .ok_or(SchedulingError::AppointmentNotFound { id: appointment_id })?;

        debug!("Drag started for appointment {}", appointment_id);
        self.state = DragState::Dragging(DragSource { original });
        Ok(())
    }

    /// `None` when no drag is in progress.
    pub fn hover(&self, target: DropTarget) -> Option<HoverFeedback> {
        let DragState::Dragging(source) = &self.state else {
            return None;
        };
        if target.is_origin_of(&source.original) {
            return Some(HoverFeedback::SameSlot);
        }

        let Some(assignment) = self.local_assignment(&target) else {
            return Some(HoverFeedback::NoDoctor);
        };

        let occupant = self.placement.validator().find_for_assignment(
            &self.appointments,
            &assignment,
            source.original.end_time,
            Some(source.original.id),
        );
        Some(match occupant {
            Some(occupant) => HoverFeedback::Occupied(occupant.id),
            None => HoverFeedback::Free,
        })
    }

    /// Release the dragged appointment on `target`.
    ///
    /// The board moves optimistically; if placement fails it snaps back to
    /// the original slot and the error is returned.
    pub async fn drop(&mut self, ctx: &RequestContext, target: DropTarget) -> Result<Placed, SchedulingError> {
        let DragState::Dragging(source) = std::mem::replace(&mut self.state, DragState::Idle) else {
            return Err(SchedulingError::invalid("No drag in progress"));
        };
        let original = source.original;

        if target.is_origin_of(&original) {
            debug!("[{}] Appointment {} dropped on its own slot", ctx.request_id, original.id);
            self.state = DragState::Completed(original.clone());
            return Ok(Placed { appointment: original, changed: false });
        }

        let assignment = match self.target_assignment(&target).await {
            Ok(assignment) => assignment,
            Err(err) => {
                warn!("[{}] Drop of appointment {} rejected: {}", ctx.request_id, original.id, err);
                return Err(err);
            }
        };

        let mut moved = original.clone();
        moved.apply(&assignment);
        self.replace(moved);

        let request = PlacementRequest {
            kind: PlacementKind::Relocate(original.id),
            assignment,
        };
        match self.placement.place(ctx, request).await {
            Ok(placed) => {
                info!("[{}] Appointment {} relocated by drag", ctx.request_id, original.id);
                self.replace(placed.appointment.clone());
                self.state = DragState::Completed(placed.appointment.clone());
                Ok(placed)
            }
            Err(err) => {
                warn!("[{}] Rolling back drag of appointment {}: {}", ctx.request_id, original.id, err);
                self.replace(original);
                Err(err)
            }
        }
    }

    /// Abandon the gesture; the store is never contacted.
    pub fn cancel(&mut self) {
        if let DragState::Dragging(source) = std::mem::replace(&mut self.state, DragState::Cancelled) {
            debug!("Drag of appointment {} cancelled", source.original.id);
            self.replace(source.original);
        } else {
            self.state = DragState::Idle;
        }
    }

    fn replace(&mut self, appointment: Appointment) {
        match self.appointments.iter_mut().find(|a| a.id == appointment.id) {
            Some(slot) => *slot = appointment,
            None => self.appointments.push(appointment),
        }
    }

    fn local_assignment(&self, target: &DropTarget) -> Option<SlotAssignment> {
        match *target {
            DropTarget::Room { room_id, date, time } => {
                let room = self.rooms.iter().find(|r| r.id == room_id)?;
                let doctor = self.resolver.resolve(&Resource::from_room(room), date, time)?;
                Some(SlotAssignment { doctor_id: doctor.id, room_id, date, time })
            }
            DropTarget::Doctor { doctor_id, date, time } => {
                let room = self.rooms.iter().find(|room| {
                    self.resolver.resolve(&Resource::from_room(room), date, time)
                        .is_some_and(|d| d.id == doctor_id)
                })?;
                Some(SlotAssignment { doctor_id, room_id: room.id, date, time })
            }
        }
    }

    async fn target_assignment(&self, target: &DropTarget) -> Result<SlotAssignment, SchedulingError> {
        match *target {
            DropTarget::Room { room_id, date, time } => self.local_assignment(target)
                .ok_or(SchedulingError::NoAvailableDoctor { room_id, date, time }),
            DropTarget::Doctor { doctor_id, date, time } => {
                let room = self.placement.locate_room(doctor_id, date, time).await?
                    .ok_or_else(|| SchedulingError::invalid(format!(
                        "Doctor {} is not on duty in any room on {} at {}",
                        doctor_id, date, time
                    )))?;
                Ok(SlotAssignment { doctor_id, room_id: room.id, date, time })
            }
        }
    }
}
