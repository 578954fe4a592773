//! Access to the remote record service.
//!
//! [`RemoteStore`] covers the device-scoped progress and exam history
//! collections, [`CatalogSource`] the shared chapter and question
//! collections. [`http::HttpRemote`] talks to the backend; [`memory::InMemoryRemote`]
//! keeps everything in process.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use quiz_core::types::{Chapter, DeviceId, ExamHistoryEntry, ProgressPatch, ProgressRecord, Question};

/// Remote errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Remote task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Device-scoped progress and exam history collections.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every progress row of the device.
    async fn fetch_progress(&self, device: &DeviceId) -> Result<Vec<ProgressRecord>>;

    /// Insert or update the (device, question) row.
    async fn upsert_progress(&self, device: &DeviceId, patch: &ProgressPatch) -> Result<()>;

    /// Mark every row of the chapter as not practiced. Returns rows touched.
    async fn reset_chapter(&self, device: &DeviceId, chapter_id: &str) -> Result<u64>;

    /// Delete every progress row of the device.
    async fn delete_progress(&self, device: &DeviceId) -> Result<u64>;

    /// Most recent exam results, newest first.
    async fn fetch_exam_history(
        &self,
        device: &DeviceId,
        limit: usize,
    ) -> Result<Vec<ExamHistoryEntry>>;

    async fn insert_exam_result(&self, device: &DeviceId, entry: &ExamHistoryEntry) -> Result<()>;

    async fn delete_exam_history(&self, device: &DeviceId) -> Result<u64>;
}

/// Shared question bank collections.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_chapters(&self) -> Result<Vec<Chapter>>;
    async fn fetch_questions(&self) -> Result<Vec<Question>>;
    async fn insert_chapter(&self, chapter: &Chapter) -> Result<()>;
    async fn delete_chapter(&self, chapter_id: &str) -> Result<()>;
    async fn insert_question(&self, question: &Question) -> Result<()>;
    async fn update_question(&self, question: &Question) -> Result<()>;
    async fn delete_question(&self, question_id: &str) -> Result<()>;
}
