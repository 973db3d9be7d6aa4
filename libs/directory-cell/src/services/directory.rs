// libs/directory-cell/src/services/directory.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreFailure, SupabaseClient};

use crate::error::DirectoryError;
use crate::models::{Doctor, Room, WeeklyScheduleEntry};

/// Read/write access to the clinic directory: doctors, rooms and the
/// weekly room schedules binding them together.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn doctors(&self) -> Result<Vec<Doctor>, DirectoryError>;

    /// All rooms, each with its schedule ordered by day and start time.
    async fn rooms(&self) -> Result<Vec<Room>, DirectoryError>;

    async fn room(&self, room_id: Uuid) -> Result<Option<Room>, DirectoryError>;

    async fn insert_schedule_entry(
        &self,
        entry: WeeklyScheduleEntry,
    ) -> Result<WeeklyScheduleEntry, DirectoryError>;

    async fn delete_schedule_entry(&self, room_id: Uuid, entry_id: Uuid) -> Result<(), DirectoryError>;
}

// ==============================================================================
// SUPABASE-BACKED DIRECTORY
// ==============================================================================

#[derive(Debug, Deserialize)]
struct RoomRow {
    id: Uuid,
    name: String,
}

pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseDirectory {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), auth_token)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    async fn get_rows<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, DirectoryError> {
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, path, Some(&self.auth_token), None)
            .await?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| DirectoryError::Backend(format!("Failed to parse {}: {}", path, e)))
    }

    async fn schedule_rows(&self, room_filter: Option<Uuid>) -> Result<Vec<WeeklyScheduleEntry>, DirectoryError> {
        let path = match room_filter {
            Some(room_id) => format!(
                "/rest/v1/room_schedules?room_id=eq.{}&order=day_of_week.asc,start_time.asc",
                room_id
            ),
            None => "/rest/v1/room_schedules?order=day_of_week.asc,start_time.asc".to_string(),
        };
        self.get_rows(&path).await
    }
}

#[async_trait]
impl Directory for SupabaseDirectory {
    async fn doctors(&self) -> Result<Vec<Doctor>, DirectoryError> {
        debug!("Fetching doctors from directory");
        self.get_rows("/rest/v1/doctors?order=full_name.asc").await
    }

    async fn rooms(&self) -> Result<Vec<Room>, DirectoryError> {
        debug!("Fetching rooms with schedules");
        let rows: Vec<RoomRow> = self.get_rows("/rest/v1/rooms?order=name.asc").await?;
        let mut by_room: HashMap<Uuid, Vec<WeeklyScheduleEntry>> = HashMap::new();
        for entry in self.schedule_rows(None).await? {
            by_room.entry(entry.room_id).or_default().push(entry);
        }

        Ok(rows.into_iter()
            .map(|row| Room {
                schedule: by_room.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    async fn room(&self, room_id: Uuid) -> Result<Option<Room>, DirectoryError> {
        debug!("Fetching room {}", room_id);
        let rows: Vec<RoomRow> = self.get_rows(&format!("/rest/v1/rooms?id=eq.{}", room_id)).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(Room {
            id: row.id,
            name: row.name,
            schedule: self.schedule_rows(Some(room_id)).await?,
        }))
    }

    async fn insert_schedule_entry(
        &self,
        entry: WeeklyScheduleEntry,
    ) -> Result<WeeklyScheduleEntry, DirectoryError> {
        let body = json!({
            "id": entry.id,
            "room_id": entry.room_id,
            "doctor_id": entry.doctor_id,
            "day_of_week": entry.day_of_week,
            "start_time": entry.start_time.format("%H:%M:%S").to_string(),
            "end_time": entry.end_time.format("%H:%M:%S").to_string(),
        });

        let result: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/room_schedules",
                Some(&self.auth_token),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| match StoreFailure::find(&e) {
                // An exclusion constraint on the table is the last line against races.
                Some(StoreFailure::UniqueViolation(_)) => DirectoryError::ScheduleOverlap { existing: None },
                _ => DirectoryError::from(e),
            })?;

        let row = result.into_iter().next()
            .ok_or_else(|| DirectoryError::Backend("Schedule insert returned no rows".to_string()))?;
        serde_json::from_value(row).map_err(|e| DirectoryError::Backend(e.to_string()))
    }

    async fn delete_schedule_entry(&self, room_id: Uuid, entry_id: Uuid) -> Result<(), DirectoryError> {
        let path = format!("/rest/v1/room_schedules?id=eq.{}&room_id=eq.{}", entry_id, room_id);
        let deleted: Vec<Value> = self.supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                Some(&self.auth_token),
                None,
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        if deleted.is_empty() {
            return Err(DirectoryError::NotFound(format!("Schedule entry {}", entry_id)));
        }
        Ok(())
    }
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

/// Process-local directory, used for fixtures and offline runs.
#[derive(Default)]
pub struct InMemoryDirectory {
    doctors: RwLock<Vec<Doctor>>,
    rooms: RwLock<Vec<Room>>,
}

impl InMemoryDirectory {
    pub fn new(doctors: Vec<Doctor>, rooms: Vec<Room>) -> Self {
        Self {
            doctors: RwLock::new(doctors),
            rooms: RwLock::new(rooms),
        }
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn doctors(&self) -> Result<Vec<Doctor>, DirectoryError> {
        Ok(self.doctors.read().await.clone())
    }

    async fn rooms(&self) -> Result<Vec<Room>, DirectoryError> {
        Ok(self.rooms.read().await.clone())
    }

    async fn room(&self, room_id: Uuid) -> Result<Option<Room>, DirectoryError> {
        Ok(self.rooms.read().await.iter().find(|r| r.id == room_id).cloned())
    }

    async fn insert_schedule_entry(
        &self,
        entry: WeeklyScheduleEntry,
    ) -> Result<WeeklyScheduleEntry, DirectoryError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.iter_mut()
            .find(|r| r.id == entry.room_id)
            .ok_or_else(|| DirectoryError::NotFound(format!("Room {}", entry.room_id)))?;
        room.schedule.push(entry.clone());
        room.schedule.sort_by_key(|e| (e.day_of_week, e.start_time));
        Ok(entry)
    }

    async fn delete_schedule_entry(&self, room_id: Uuid, entry_id: Uuid) -> Result<(), DirectoryError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.iter_mut()
            .find(|r| r.id == room_id)
            .ok_or_else(|| DirectoryError::NotFound(format!("Room {}", room_id)))?;
        let before = room.schedule.len();
        room.schedule.retain(|e| e.id != entry_id);
        if room.schedule.len() == before {
            return Err(DirectoryError::NotFound(format!("Schedule entry {}", entry_id)));
        }
        Ok(())
    }
}
