//! Quiz client library.
//!
//! Keeps learning progress in a local SQLite cache in front of the remote
//! record service, loads the question catalog with a bundled fallback, and
//! guards catalog administration.

pub mod admin;
pub mod catalog;
pub mod config;
pub mod db;
pub mod progress;
pub mod remote;

pub use admin::{AdminError, CatalogAdmin};
pub use catalog::{CatalogOrigin, QuestionCatalog};
pub use config::{ClientConfig, ConfigError};
pub use db::{DbError, LocalCache};
pub use progress::{FavoriteToggle, ProgressStore, RemoteWrite, SyncError, SyncReport};
pub use remote::{CatalogSource, RemoteError, RemoteStore};
