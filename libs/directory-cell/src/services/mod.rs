pub mod directory;
pub mod schedule;

pub use directory::{Directory, InMemoryDirectory, SupabaseDirectory};
pub use schedule::ScheduleService;
