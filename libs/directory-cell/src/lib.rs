pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::DirectoryError;
pub use models::*;
pub use services::*;
