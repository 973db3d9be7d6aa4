// libs/appointment-cell/src/services/placement.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use directory_cell::Directory;
use shared_models::auth::RequestContext;

use crate::models::{
    Appointment, AppointmentFilter, BoardSlot, PlacementKind, PlacementRequest, Placed, Room,
    ResourceRef, SchedulingError, SlotAssignment,
};
use crate::services::availability::AvailabilityResolver;
use crate::services::calendar::Resource;
use crate::services::conflict::ConflictValidator;
use crate::services::store::AppointmentStore;

/// Creates and relocates appointments.
///
/// A placement goes through, in order: availability resolution against the
/// room calendar, conflict validation on the room and doctor slots, the
/// no-op check for relocations, and finally the store's atomic write.
pub struct PlacementService {
    directory: Arc<dyn Directory>,
    store: Arc<dyn AppointmentStore>,
    validator: ConflictValidator,
}

impl PlacementService {
    pub fn new(
        directory: Arc<dyn Directory>,
        store: Arc<dyn AppointmentStore>,
        validator: ConflictValidator,
    ) -> Self {
        Self { directory, store, validator }
    }

    pub fn validator(&self) -> &ConflictValidator {
        &self.validator
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    pub async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        self.store.list(filter).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.store.get(id).await
    }

    pub async fn place(&self, ctx: &RequestContext, request: PlacementRequest) -> Result<Placed, SchedulingError> {
        let PlacementRequest { kind, assignment } = request;
        debug!(
            "[{}] {} placing {:?} at doctor {} room {} {} {}",
            ctx.request_id, ctx.actor_id, kind, assignment.doctor_id, assignment.room_id, assignment.date, assignment.time
        );

        self.ensure_doctor_present(&assignment).await?;

        let (current, end_time) = match &kind {
            PlacementKind::Create(new) => (None, new.end_time),
            PlacementKind::Relocate(id) => {
                let current = self.store.get(*id).await?;
                let end_time = current.end_time;
                (Some(current), end_time)
            }
        };

        let live = self.store.list(&AppointmentFilter::live_on(assignment.date)).await?;
        let exclude = current.as_ref().map(|a| a.id);
        if let Some(occupant) = self.validator.find_for_assignment(&live, &assignment, end_time, exclude) {
            warn!(
                "[{}] Slot {} {} in room {} is held by appointment {}",
                ctx.request_id, assignment.date, assignment.time, assignment.room_id, occupant.id
            );
            return Err(SchedulingError::SlotOccupied { occupant: Some(occupant.id) });
        }

        let appointment = match (kind, current) {
            (PlacementKind::Relocate(_), Some(current)) if current.is_at(&assignment) => {
                debug!("[{}] Appointment {} already at target slot", ctx.request_id, current.id);
                return Ok(Placed { appointment: current, changed: false });
            }
            (PlacementKind::Relocate(id), _) => {
                let moved = self.store.relocate(id, assignment).await?;
                info!(
                    "[{}] Appointment {} moved to room {} on {} at {} by {}",
                    ctx.request_id, id, assignment.room_id, assignment.date, assignment.time, ctx.actor_id
                );
                moved
            }
            (PlacementKind::Create(new), _) => {
                let created = self.store.insert(new, assignment).await?;
                info!(
                    "[{}] Appointment {} booked in room {} on {} at {} by {}",
                    ctx.request_id, created.id, assignment.room_id, assignment.date, assignment.time, ctx.actor_id
                );
                created
            }
        };

        Ok(Placed { appointment, changed: true })
    }

    async fn ensure_doctor_present(&self, assignment: &SlotAssignment) -> Result<(), SchedulingError> {
        let room = self.directory.room(assignment.room_id).await?
            .ok_or_else(|| SchedulingError::invalid(format!("Room {} not found", assignment.room_id)))?;
        let resolver = AvailabilityResolver::new(self.directory.doctors().await?);

        let resolved = resolver
            .resolve(&Resource::from_room(&room), assignment.date, assignment.time)
            .map(|doctor| doctor.id);

        if resolved != Some(assignment.doctor_id) {
            debug!(
                "Room {} resolves to {:?} on {} at {}, requested doctor {}",
                room.id, resolved, assignment.date, assignment.time, assignment.doctor_id
            );
            return Err(SchedulingError::NoAvailableDoctor {
                room_id: assignment.room_id,
                date: assignment.date,
                time: assignment.time,
            });
        }
        Ok(())
    }

    /// The room whose calendar puts `doctor_id` on duty at that instant.
    pub async fn locate_room(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Room>, SchedulingError> {
        let resolver = AvailabilityResolver::new(self.directory.doctors().await?);
        let room = self.directory.rooms().await?
            .into_iter()
            .find(|room| {
                resolver.resolve(&Resource::from_room(room), date, time)
                    .is_some_and(|doctor| doctor.id == doctor_id)
            });
        Ok(room)
    }

    /// Day view of a room: every grid slot with its doctor and live occupant.
    pub async fn board(&self, room_id: Uuid, date: NaiveDate) -> Result<Vec<BoardSlot>, SchedulingError> {
        let room = self.directory.room(room_id).await?
            .ok_or_else(|| SchedulingError::invalid(format!("Room {} not found", room_id)))?;
        let resolver = AvailabilityResolver::new(self.directory.doctors().await?);
        let resource = Resource::from_room(&room);

        let filter = AppointmentFilter {
            room_id: Some(room_id),
            ..AppointmentFilter::live_on(date)
        };
        let appointments = self.store.list(&filter).await?;

        Ok(resource.calendar
            .slots_for(date, self.validator.granularity_minutes())
            .into_iter()
            .map(|time| BoardSlot {
                time,
                doctor: resolver.resolve(&resource, date, time).cloned(),
                appointment: self.validator
                    .find(&appointments, ResourceRef::Room(room_id), date, time)
                    .cloned(),
            })
            .collect())
    }
}
