//! Progress endpoints

use axum::{extract::State, Extension, Json};

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::auth::DeviceContext;
use crate::AppState;

/// GET /api/progress
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
) -> Result<Json<ProgressListResponse>> {
    let records = state.db.list_progress(&ctx.device_id).await?;
    Ok(Json(ProgressListResponse { records }))
}

/// PUT /api/progress
pub async fn upsert(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
    Json(patch): Json<ProgressPatch>,
) -> Result<Json<ProgressRecord>> {
    if patch.question_id.trim().is_empty() {
        return Err(ApiError::BadRequest("question_id is required".to_string()));
    }

    let record = state.db.upsert_progress(&ctx.device_id, &patch).await?;
    tracing::debug!(
        device_id = %ctx.device_id,
        question_id = %record.question_id,
        "progress upserted"
    );
    Ok(Json(record))
}

/// POST /api/progress/reset-chapter
pub async fn reset_chapter(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
    Json(request): Json<ResetChapterRequest>,
) -> Result<Json<UpdatedResponse>> {
    let updated = state
        .db
        .reset_chapter(&ctx.device_id, &request.chapter_id)
        .await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// DELETE /api/progress
pub async fn delete_all(
    State(state): State<AppState>,
    Extension(ctx): Extension<DeviceContext>,
) -> Result<Json<DeletedResponse>> {
    let deleted = state.db.delete_progress(&ctx.device_id).await?;
    tracing::info!(device_id = %ctx.device_id, deleted, "progress deleted");
    Ok(Json(DeletedResponse { deleted }))
}
