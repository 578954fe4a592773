//! Core quiz library shared by the client and the record service.
//!
//! Provides:
//! - Catalog types (Chapter, Question, QuestionKind)
//! - Progress types (DeviceId, ProgressRecord, ProgressPatch, ExamHistoryEntry)
//! - The cache projection rebuilt from remote progress rows (CacheSnapshot)

pub mod error;
pub mod snapshot;
pub mod types;

pub use error::{CoreError, Result};
pub use snapshot::{CacheSnapshot, EXAM_HISTORY_LIMIT};
pub use types::{
    Chapter, DeviceId, ExamHistoryEntry, ProgressFlag, ProgressPatch, ProgressRecord, Question,
    QuestionKind,
};
