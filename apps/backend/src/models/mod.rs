//! Database models and API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub use quiz_core::types::{
    Chapter, DeviceId, ExamHistoryEntry, ProgressPatch, ProgressRecord, Question, QuestionKind,
};
use quiz_core::{types::options_from_value, CoreError, EXAM_HISTORY_LIMIT};

// === Database Entity Types ===

/// Progress row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbProgress {
    pub device_id: String,
    pub question_id: String,
    pub chapter_id: String,
    pub is_practiced: bool,
    pub is_wrong: bool,
    pub is_favorite: bool,
    pub is_mastered: bool,
    pub updated_at: DateTime<Utc>,
}

impl DbProgress {
    pub fn into_record(self) -> Result<ProgressRecord, CoreError> {
        Ok(ProgressRecord {
            device_id: DeviceId::parse(&self.device_id)?,
            question_id: self.question_id,
            chapter_id: self.chapter_id,
            is_practiced: self.is_practiced,
            is_wrong: self.is_wrong,
            is_favorite: self.is_favorite,
            is_mastered: self.is_mastered,
            updated_at: self.updated_at,
        })
    }
}

/// Exam history row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbExamEntry {
    pub id: i64,
    pub device_id: String,
    pub score: i32,
    pub total: i32,
    pub correct: i32,
    pub wrong: i32,
    pub used_time: i32,
    pub created_at: DateTime<Utc>,
}

impl DbExamEntry {
    pub fn to_entry(&self) -> ExamHistoryEntry {
        let count = |v: i32| u32::try_from(v).unwrap_or(0);
        ExamHistoryEntry {
            created_at: self.created_at,
            score: count(self.score),
            total: count(self.total),
            correct: count(self.correct),
            wrong: count(self.wrong),
            used_time: count(self.used_time),
        }
    }
}

/// Chapter row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbChapter {
    pub id: String,
    pub name: String,
    pub sort_order: i32,
}

impl From<DbChapter> for Chapter {
    fn from(row: DbChapter) -> Self {
        Chapter {
            id: row.id,
            name: row.name,
            order: row.sort_order,
        }
    }
}

/// Question row in PostgreSQL; `options` holds a JSON array as text
#[derive(Debug, Clone, FromRow)]
pub struct DbQuestion {
    pub id: String,
    pub chapter_id: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub question: String,
    pub options: String,
    pub answer: String,
    pub explanation: String,
}

impl DbQuestion {
    pub fn into_question(self) -> Result<Question, CoreError> {
        Ok(Question {
            kind: QuestionKind::parse(&self.kind)?,
            options: options_from_value(serde_json::Value::String(self.options)),
            id: self.id,
            chapter_id: self.chapter_id,
            question: self.question,
            answer: self.answer,
            explanation: self.explanation,
        })
    }
}

// === API Request/Response Types ===

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressListResponse {
    pub records: Vec<ProgressRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ResetChapterRequest {
    pub chapter_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// Largest history page a client may ask for
pub const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ExamHistoryQuery {
    pub limit: Option<i64>,
}

impl ExamHistoryQuery {
    /// Requested page size, clamped to `1..=MAX_HISTORY_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(EXAM_HISTORY_LIMIT as i64)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExamHistoryResponse {
    pub entries: Vec<ExamHistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChapterListResponse {
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionListResponse {
    pub questions: Vec<Question>,
}
