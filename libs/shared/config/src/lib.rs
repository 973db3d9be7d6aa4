use std::env;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_SLOT_GRANULARITY_MINUTES: u32 = 30;
const DEFAULT_API_PORT: u16 = 3000;

/// How a live appointment claims its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyPolicy {
    /// Only the exact start instant is claimed.
    #[default]
    StartInstant,
    /// The whole `[start, end)` interval is claimed.
    ///
    /// The in-memory store checks this under its lock. Against PostgREST the
    /// unique indexes only cover start instants, so the interval check is
    /// atomic only when the `appointments` table also carries the exclusion
    /// constraints described on `SupabaseAppointmentStore`.
    Interval,
}

impl OccupancyPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "start_instant" | "start" => Some(Self::StartInstant),
            "interval" | "overlap" => Some(Self::Interval),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub slot_granularity_minutes: u32,
    pub occupancy_policy: OccupancyPolicy,
    pub api_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            slot_granularity_minutes: env::var("SLOT_GRANULARITY_MINUTES")
                .ok()
                .and_then(|raw| match raw.parse::<u32>() {
                    Ok(0) | Err(_) => {
                        warn!("SLOT_GRANULARITY_MINUTES={} is not a positive integer, using default", raw);
                        None
                    }
                    Ok(minutes) => Some(minutes),
                })
                .unwrap_or(DEFAULT_SLOT_GRANULARITY_MINUTES),
            occupancy_policy: env::var("OCCUPANCY_POLICY")
                .ok()
                .and_then(|raw| {
                    let parsed = OccupancyPolicy::parse(&raw);
                    if parsed.is_none() {
                        warn!("Unknown OCCUPANCY_POLICY '{}', using start_instant", raw);
                    }
                    parsed
                })
                .unwrap_or_default(),
            api_port: env::var("API_PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_API_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            slot_granularity_minutes: DEFAULT_SLOT_GRANULARITY_MINUTES,
            occupancy_policy: OccupancyPolicy::StartInstant,
            api_port: DEFAULT_API_PORT,
        }
    }
}
