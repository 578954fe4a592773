//! Local SQLite cache.

pub mod cache;
pub mod error;
pub mod schema;

pub use cache::{keys, LocalCache};
pub use error::DbError;
