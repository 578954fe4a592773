//! Test fixtures and factory functions for creating test data.

use chrono::{Duration, Utc};
use serde_json::json;

use quiz_backend::models::{Chapter, ExamHistoryEntry, Question, QuestionKind};

/// Unique id with a readable prefix.
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Exam result finished `minutes_ago` minutes in the past.
pub fn exam_entry(minutes_ago: i64, score: u32) -> ExamHistoryEntry {
    ExamHistoryEntry {
        created_at: Utc::now() - Duration::minutes(minutes_ago),
        score,
        total: 10,
        correct: score / 10,
        wrong: 10 - score / 10,
        used_time: 300,
    }
}

pub fn chapter(id: &str, order: i32) -> Chapter {
    Chapter {
        id: id.to_string(),
        name: format!("Chapter {}", id),
        order,
    }
}

pub fn question(id: &str, chapter_id: &str) -> Question {
    Question {
        id: id.to_string(),
        chapter_id: chapter_id.to_string(),
        kind: QuestionKind::Single,
        question: "Which protocol resolves host names?".to_string(),
        options: vec!["A. DNS".to_string(), "B. ARP".to_string()],
        answer: "A".to_string(),
        explanation: "DNS maps names to addresses.".to_string(),
    }
}

/// Create a progress upsert body.
pub fn progress_patch(question_id: &str, fields: serde_json::Value) -> serde_json::Value {
    let mut body = json!({ "question_id": question_id });
    if let (Some(body), Some(fields)) = (body.as_object_mut(), fields.as_object()) {
        body.extend(fields.clone());
    }
    body
}

/// Create a reset chapter request body.
pub fn reset_chapter_request(chapter_id: &str) -> serde_json::Value {
    json!({ "chapter_id": chapter_id })
}
