// libs/directory-cell/src/services/schedule.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DirectoryError;
use crate::models::{
    day_of_week, CreateScheduleEntryRequest, Doctor, ResourceSchedule, ScheduleOwner,
    WeeklyScheduleEntry,
};
use crate::services::directory::Directory;

/// Directory operations on top of any [`Directory`] backend.
///
/// The room schedule is the single source of truth for who works where;
/// a doctor's weekly calendar is always derived from the rooms.
pub struct ScheduleService {
    directory: Arc<dyn Directory>,
}

impl ScheduleService {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Active doctors with at least one room binding on the weekday of `date`.
    pub async fn available_doctors(&self, date: NaiveDate) -> Result<Vec<Doctor>, DirectoryError> {
        let day = day_of_week(date);
        debug!("Looking up doctors scheduled on {} (day {})", date, day);

        let rooms = self.directory.rooms().await?;
        let scheduled: BTreeSet<Uuid> = rooms.iter()
            .flat_map(|room| room.schedule.iter())
            .filter(|entry| entry.day_of_week == day)
            .map(|entry| entry.doctor_id)
            .collect();

        let mut doctors: Vec<Doctor> = self.directory.doctors().await?
            .into_iter()
            .filter(|doctor| doctor.is_active && scheduled.contains(&doctor.id))
            .collect();
        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        Ok(doctors)
    }

    /// Weekly entries of a room, or of a doctor across every room.
    pub async fn resource_schedule(&self, resource_id: Uuid) -> Result<ResourceSchedule, DirectoryError> {
        if let Some(room) = self.directory.room(resource_id).await? {
            return Ok(ResourceSchedule {
                resource_id,
                owner: ScheduleOwner::Room,
                entries: room.schedule,
            });
        }

        let doctors = self.directory.doctors().await?;
        if !doctors.iter().any(|d| d.id == resource_id) {
            return Err(DirectoryError::NotFound(format!("Resource {}", resource_id)));
        }

        let mut entries: Vec<WeeklyScheduleEntry> = self.directory.rooms().await?
            .into_iter()
            .flat_map(|room| room.schedule)
            .filter(|entry| entry.doctor_id == resource_id)
            .collect();
        entries.sort_by_key(|e| (e.day_of_week, e.start_time, e.end_time));

        Ok(ResourceSchedule {
            resource_id,
            owner: ScheduleOwner::Doctor,
            entries,
        })
    }

    /// Admit a new weekly binding into a room.
    ///
    /// Rejected when malformed, when it overlaps another entry of the same
    /// room and day, or when the doctor is already bound elsewhere at an
    /// overlapping time.
    pub async fn admit_entry(
        &self,
        room_id: Uuid,
        request: CreateScheduleEntryRequest,
    ) -> Result<WeeklyScheduleEntry, DirectoryError> {
        let entry = WeeklyScheduleEntry {
            id: Uuid::new_v4(),
            room_id,
            doctor_id: request.doctor_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
        };

        if entry.day_of_week > 6 {
            return Err(DirectoryError::InvalidEntry(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }
        if entry.start_time >= entry.end_time {
            return Err(DirectoryError::InvalidEntry("Start time must be before end time".to_string()));
        }

        let doctors = self.directory.doctors().await?;
        if !doctors.iter().any(|d| d.id == entry.doctor_id) {
            return Err(DirectoryError::NotFound(format!("Doctor {}", entry.doctor_id)));
        }

        let rooms = self.directory.rooms().await?;
        if !rooms.iter().any(|r| r.id == room_id) {
            return Err(DirectoryError::NotFound(format!("Room {}", room_id)));
        }

        let clash = rooms.iter()
            .flat_map(|room| room.schedule.iter())
            .find(|existing| {
                (existing.room_id == room_id || existing.doctor_id == entry.doctor_id)
                    && existing.overlaps(&entry)
            });
        if let Some(existing) = clash {
            warn!(
                "Rejecting schedule entry for doctor {} in room {}: overlaps entry {}",
                entry.doctor_id, room_id, existing.id
            );
            return Err(DirectoryError::ScheduleOverlap { existing: Some(existing.id) });
        }

        let stored = self.directory.insert_schedule_entry(entry).await?;
        info!(
            "Schedule entry {} admitted: doctor {} in room {} on day {} {}-{}",
            stored.id, stored.doctor_id, room_id, stored.day_of_week, stored.start_time, stored.end_time
        );
        Ok(stored)
    }

    pub async fn remove_entry(&self, room_id: Uuid, entry_id: Uuid) -> Result<(), DirectoryError> {
        self.directory.delete_schedule_entry(room_id, entry_id).await?;
        info!("Schedule entry {} removed from room {}", entry_id, room_id);
        Ok(())
    }
}
