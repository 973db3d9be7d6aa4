// libs/appointment-cell/src/services/conflict.rs
use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::debug;
use uuid::Uuid;

use shared_config::{AppConfig, OccupancyPolicy};

use crate::models::{Appointment, ResourceRef, SlotAssignment};

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// Decides whether a `(resource, date, time)` slot already holds a live appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictValidator {
    policy: OccupancyPolicy,
    granularity_minutes: u32,
}

impl ConflictValidator {
    pub fn new(policy: OccupancyPolicy, granularity_minutes: u32) -> Self {
        Self { policy, granularity_minutes }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.occupancy_policy, config.slot_granularity_minutes)
    }

    pub fn policy(&self) -> OccupancyPolicy {
        self.policy
    }

    pub fn granularity_minutes(&self) -> u32 {
        self.granularity_minutes
    }

    pub fn find<'a>(
        &self,
        appointments: &'a [Appointment],
        resource: ResourceRef,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Option<&'a Appointment> {
        self.find_excluding(appointments, resource, date, time, None)
    }

    /// Like [`find`](Self::find), ignoring the appointment with id `exclude`.
    pub fn find_excluding<'a>(
        &self,
        appointments: &'a [Appointment],
        resource: ResourceRef,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Option<&'a Appointment> {
        self.find_span(appointments, resource, date, time, None, exclude)
    }

    pub fn is_occupied(
        &self,
        appointments: &[Appointment],
        resource: ResourceRef,
        date: NaiveDate,
        time: NaiveTime,
    ) -> bool {
        self.find(appointments, resource, date, time).is_some()
    }

    /// First live appointment colliding with `assignment` on either its room or its doctor.
    pub fn find_for_assignment<'a>(
        &self,
        appointments: &'a [Appointment],
        assignment: &SlotAssignment,
        end_time: Option<NaiveTime>,
        exclude: Option<Uuid>,
    ) -> Option<&'a Appointment> {
        [ResourceRef::Room(assignment.room_id), ResourceRef::Doctor(assignment.doctor_id)]
            .into_iter()
            .find_map(|resource| {
                self.find_span(appointments, resource, assignment.date, assignment.time, end_time, exclude)
            })
    }

    fn find_span<'a>(
        &self,
        appointments: &'a [Appointment],
        resource: ResourceRef,
        date: NaiveDate,
        time: NaiveTime,
        end_time: Option<NaiveTime>,
        exclude: Option<Uuid>,
    ) -> Option<&'a Appointment> {
        let proposed = self.span(time, end_time);
        let hit = appointments.iter()
            .filter(|a| a.is_live())
            .filter(|a| Some(a.id) != exclude)
            .filter(|a| a.appointment_date == date && resource.holds(a))
            .find(|a| match self.policy {
                OccupancyPolicy::StartInstant => a.appointment_time == time,
                OccupancyPolicy::Interval => {
                    let existing = self.span(a.appointment_time, a.end_time);
                    proposed.0 < existing.1 && existing.0 < proposed.1
                }
            });

        if let Some(occupant) = hit {
            debug!("{} on {} at {} is held by appointment {}", resource, date, time, occupant.id);
        }
        hit
    }

    /// Half-open span in seconds from midnight; a missing or inverted end
    /// falls back to one slot of the configured granularity.
    fn span(&self, start: NaiveTime, end: Option<NaiveTime>) -> (u32, u32) {
        let from = start.num_seconds_from_midnight();
        let to = match end {
            Some(end) if end > start => end.num_seconds_from_midnight(),
            _ => from.saturating_add(self.granularity_minutes.max(1).saturating_mul(60)),
        };
        (from, to.min(SECONDS_PER_DAY))
    }
}
