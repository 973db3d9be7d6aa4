// libs/appointment-cell/src/services/calendar.rs
use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::warn;
use uuid::Uuid;

use crate::models::{day_of_week, Doctor, ResourceRef, Room, WeeklyScheduleEntry};

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// Immutable recurring weekly availability of one resource.
///
/// Entries are kept ordered by `(day_of_week, start_time, end_time)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeeklyCalendar {
    entries: Vec<WeeklyScheduleEntry>,
}

impl WeeklyCalendar {
    pub fn new(entries: impl IntoIterator<Item = WeeklyScheduleEntry>) -> Self {
        let mut entries: Vec<WeeklyScheduleEntry> = entries
            .into_iter()
            .filter(|entry| {
                let ok = entry.is_well_formed();
                if !ok {
                    warn!(
                        "Ignoring malformed schedule entry {} (day {}, {}-{})",
                        entry.id, entry.day_of_week, entry.start_time, entry.end_time
                    );
                }
                ok
            })
            .collect();
        entries.sort_by_key(|e| (e.day_of_week, e.start_time, e.end_time));
        Self { entries }
    }

    /// A doctor's calendar as derived from every room they are bound to.
    pub fn for_doctor(doctor_id: Uuid, rooms: &[Room]) -> Self {
        Self::new(
            rooms.iter()
                .flat_map(|room| room.schedule.iter())
                .filter(|entry| entry.doctor_id == doctor_id)
                .cloned(),
        )
    }

    pub fn entries(&self) -> &[WeeklyScheduleEntry] {
        &self.entries
    }

    pub fn entries_on(&self, day: u8) -> impl Iterator<Item = &WeeklyScheduleEntry> + '_ {
        self.entries.iter().filter(move |e| e.day_of_week == day)
    }

    pub fn entries_for_date(&self, date: NaiveDate) -> impl Iterator<Item = &WeeklyScheduleEntry> + '_ {
        self.entries_on(day_of_week(date))
    }

    /// Entries whose half-open interval contains `time` on the weekday of `date`.
    pub fn entries_at(&self, date: NaiveDate, time: NaiveTime) -> impl Iterator<Item = &WeeklyScheduleEntry> + '_ {
        self.entries_for_date(date).filter(move |e| e.contains(time))
    }

    /// Bookable slots of `date`, ascending: the whole slots of each entry,
    /// so gaps between entries stay off the grid. Empty on days off.
    pub fn slots_for(&self, date: NaiveDate, granularity_minutes: u32) -> Vec<NaiveTime> {
        let slots: BTreeSet<NaiveTime> = self.entries_for_date(date)
            .flat_map(|entry| generate_slots(entry.start_time, entry.end_time, granularity_minutes))
            .collect();
        slots.into_iter().collect()
    }
}

/// A room or doctor column together with its weekly calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub reference: ResourceRef,
    pub label: String,
    pub calendar: WeeklyCalendar,
}

impl Resource {
    pub fn from_room(room: &Room) -> Self {
        Self {
            reference: ResourceRef::Room(room.id),
            label: room.name.clone(),
            calendar: WeeklyCalendar::new(room.schedule.iter().cloned()),
        }
    }

    pub fn from_doctor(doctor: &Doctor, rooms: &[Room]) -> Self {
        Self {
            reference: ResourceRef::Doctor(doctor.id),
            label: doctor.full_name.clone(),
            calendar: WeeklyCalendar::for_doctor(doctor.id, rooms),
        }
    }
}

// ==============================================================================
// SLOT GENERATION
// ==============================================================================

/// Discrete slot start times over `[day_start, day_end)`.
///
/// Cloning restarts the sequence from the clone point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlots {
    next: u32,
    end: u32,
    step: u32,
}

impl TimeSlots {
    fn empty() -> Self {
        Self { next: 0, end: 0, step: 1 }
    }
}

impl Iterator for TimeSlots {
    type Item = NaiveTime;

    fn next(&mut self) -> Option<NaiveTime> {
        let slot_end = self.next.checked_add(self.step)?;
        if slot_end > self.end {
            return None;
        }
        let slot = NaiveTime::from_num_seconds_from_midnight_opt(self.next, 0)?;
        self.next = slot_end;
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end.saturating_sub(self.next) / self.step) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TimeSlots {}

/// Slot start times from `day_start` up to, but excluding, `day_end`.
///
/// Only whole steps are produced: a trailing remainder shorter than the
/// granularity is dropped, so the last slot ends at or before `day_end`.
/// A zero granularity or an empty span yields nothing.
pub fn generate_slots(day_start: NaiveTime, day_end: NaiveTime, granularity_minutes: u32) -> TimeSlots {
    if granularity_minutes == 0 || day_end <= day_start {
        return TimeSlots::empty();
    }

    TimeSlots {
        next: day_start.num_seconds_from_midnight(),
        end: day_end.num_seconds_from_midnight().min(SECONDS_PER_DAY),
        step: granularity_minutes.saturating_mul(60),
    }
}
