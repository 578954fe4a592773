//! Chapter and question endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::AppState;

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

fn validate_question(question: &Question) -> Result<()> {
    require("id", &question.id)?;
    require("chapter_id", &question.chapter_id)?;
    require("question", &question.question)?;
    require("answer", &question.answer)
}

/// GET /api/chapters
pub async fn list_chapters(State(state): State<AppState>) -> Result<Json<ChapterListResponse>> {
    let chapters = state.db.list_chapters().await?;
    Ok(Json(ChapterListResponse { chapters }))
}

/// GET /api/questions
pub async fn list_questions(State(state): State<AppState>) -> Result<Json<QuestionListResponse>> {
    let questions = state.db.list_questions().await?;
    Ok(Json(QuestionListResponse { questions }))
}

/// POST /api/chapters
pub async fn create_chapter(
    State(state): State<AppState>,
    Json(chapter): Json<Chapter>,
) -> Result<StatusCode> {
    require("id", &chapter.id)?;
    require("name", &chapter.name)?;

    state.db.insert_chapter(&chapter).await?;
    tracing::info!(chapter_id = %chapter.id, "chapter created");
    Ok(StatusCode::CREATED)
}

/// DELETE /api/chapters/:id
pub async fn delete_chapter(
    State(state): State<AppState>,
    Path(chapter_id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_chapter(&chapter_id).await? {
        return Err(ApiError::NotFound(format!("chapter {chapter_id}")));
    }
    tracing::info!(%chapter_id, "chapter deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/questions
pub async fn create_question(
    State(state): State<AppState>,
    Json(question): Json<Question>,
) -> Result<StatusCode> {
    validate_question(&question)?;

    state.db.insert_question(&question).await?;
    tracing::info!(question_id = %question.id, "question created");
    Ok(StatusCode::CREATED)
}

/// PUT /api/questions/:id
pub async fn update_question(
    State(state): State<AppState>,
    Path(question_id): Path<String>,
    Json(mut question): Json<Question>,
) -> Result<StatusCode> {
    question.id = question_id;
    validate_question(&question)?;

    if !state.db.update_question(&question).await? {
        return Err(ApiError::NotFound(format!("question {}", question.id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/questions/:id
pub async fn delete_question(
    State(state): State<AppState>,
    Path(question_id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_question(&question_id).await? {
        return Err(ApiError::NotFound(format!("question {question_id}")));
    }
    tracing::info!(%question_id, "question deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question {
            id: "q1".into(),
            chapter_id: "ch1".into(),
            kind: QuestionKind::Single,
            question: "Which layer routes packets?".into(),
            options: vec!["A. Network".into(), "B. Physical".into()],
            answer: "A".into(),
            explanation: String::new(),
        }
    }

    #[test]
    fn test_valid_question_passes() {
        assert!(validate_question(&question()).is_ok());
    }

    #[test]
    fn test_blank_answer_is_rejected() {
        let mut q = question();
        q.answer = "  ".into();
        let err = validate_question(&q).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: answer is required");
    }

    #[test]
    fn test_missing_chapter_is_rejected() {
        let mut q = question();
        q.chapter_id.clear();
        assert!(matches!(validate_question(&q), Err(ApiError::BadRequest(_))));
    }
}
