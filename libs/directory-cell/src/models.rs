// libs/directory-cell/src/models.rs
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// DIRECTORY ENTITIES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
    /// Inactive doctors never resolve as present.
    pub is_active: bool,
    /// Display only.
    pub calendar_color: Option<String>,
}

/// One recurring weekly binding of a doctor to a room, half-open `[start_time, end_time)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    pub id: Uuid,
    pub room_id: Uuid,
    pub doctor_id: Uuid,
    /// 0 = Sunday, 1 = Monday, ... 6 = Saturday
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl WeeklyScheduleEntry {
    pub fn is_well_formed(&self) -> bool {
        self.day_of_week <= 6 && self.start_time < self.end_time
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time < self.end_time
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Same weekday and intersecting half-open intervals.
    pub fn overlaps(&self, other: &WeeklyScheduleEntry) -> bool {
        self.day_of_week == other.day_of_week
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub schedule: Vec<WeeklyScheduleEntry>,
}

/// Weekday index used by every schedule table: 0 = Sunday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleEntryRequest {
    pub doctor_id: Uuid,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableDoctorsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleOwner {
    Room,
    Doctor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchedule {
    pub resource_id: Uuid,
    pub owner: ScheduleOwner,
    pub entries: Vec<WeeklyScheduleEntry>,
}
