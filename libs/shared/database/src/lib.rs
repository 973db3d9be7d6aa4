pub mod supabase;

pub use supabase::{StoreFailure, SupabaseClient};
