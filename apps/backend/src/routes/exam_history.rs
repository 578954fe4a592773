//! Exam history endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::auth::DeviceContext;
use crate::AppState;

/// GET /api/exam-history?limit=N
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
    Query(query): Query<ExamHistoryQuery>,
) -> Result<Json<ExamHistoryResponse>> {
    let entries = state
        .db
        .list_exam_history(&ctx.device_id, query.limit())
        .await?;
    Ok(Json(ExamHistoryResponse { entries }))
}

/// POST /api/exam-history
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
    Json(entry): Json<ExamHistoryEntry>,
) -> Result<StatusCode> {
    if entry.score > 100 {
        return Err(ApiError::BadRequest("score must be between 0 and 100".to_string()));
    }

    let id = state.db.insert_exam_result(&ctx.device_id, &entry).await?;
    tracing::debug!(device_id = %ctx.device_id, id, "exam result stored");
    Ok(StatusCode::CREATED)
}

/// DELETE /api/exam-history
pub async fn delete_all(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
) -> Result<Json<DeletedResponse>> {
    let deleted = state.db.delete_exam_history(&ctx.device_id).await?;
    tracing::info!(device_id = %ctx.device_id, deleted, "exam history deleted");
    Ok(Json(DeletedResponse { deleted }))
}
