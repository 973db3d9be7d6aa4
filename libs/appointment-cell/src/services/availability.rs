// libs/appointment-cell/src/services/availability.rs
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Doctor, ResourceRef, WeeklyScheduleEntry};
use crate::services::calendar::Resource;

/// Answers "who is present in this column at this instant" from weekly calendars.
pub struct AvailabilityResolver {
    doctors: HashMap<Uuid, Doctor>,
}

impl AvailabilityResolver {
    pub fn new(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        Self {
            doctors: doctors.into_iter().map(|d| (d.id, d)).collect(),
        }
    }

    /// The doctor bound to `resource` at `time` on `date`, if any.
    ///
    /// When several entries cover the instant the narrowest one wins, then the
    /// earliest start, then the lowest entry id.
    pub fn resolve(&self, resource: &Resource, date: NaiveDate, time: NaiveTime) -> Option<&Doctor> {
        let candidates: Vec<(&WeeklyScheduleEntry, &Doctor)> = resource.calendar
            .entries_at(date, time)
            .filter(|entry| match resource.reference {
                ResourceRef::Room(_) => true,
                ResourceRef::Doctor(id) => entry.doctor_id == id,
            })
            .filter_map(|entry| {
                self.doctors.get(&entry.doctor_id)
                    .filter(|doctor| doctor.is_active)
                    .map(|doctor| (entry, doctor))
            })
            .collect();

        if candidates.len() > 1 {
            warn!(
                "{} schedule entries overlap for {} on {} at {}; using the narrowest",
                candidates.len(), resource.reference, date, time
            );
        }

        let chosen = candidates.into_iter()
            .min_by_key(|(entry, _)| (entry.duration(), entry.start_time, entry.id))
            .map(|(_, doctor)| doctor);

        debug!(
            "Resolved {} on {} at {} to {:?}",
            resource.reference, date, time, chosen.map(|d| d.id)
        );
        chosen
    }
}
