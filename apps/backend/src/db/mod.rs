//! PostgreSQL database operations

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::{ApiError, Result};
use crate::models::*;

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // === Progress Repository ===

    /// Get every progress row of a device
    pub async fn list_progress(&self, device_id: &DeviceId) -> Result<Vec<ProgressRecord>> {
        let rows = sqlx::query_as::<_, DbProgress>(
            r#"
            SELECT device_id, question_id, chapter_id, is_practiced, is_wrong,
                   is_favorite, is_mastered, updated_at
            FROM progress
            WHERE device_id = $1
            ORDER BY question_id
            "#,
        )
        .bind(device_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                row.into_record()
                    .map_err(|e| ApiError::Internal(e.to_string()))
            })
            .collect()
    }

    /// Insert or update the (device, question) row. Fields absent from the
    /// patch keep their stored value, or their default on first insert.
    pub async fn upsert_progress(
        &self,
        device_id: &DeviceId,
        patch: &ProgressPatch,
    ) -> Result<ProgressRecord> {
        let row = sqlx::query_as::<_, DbProgress>(
            r#"
            INSERT INTO progress (device_id, question_id, chapter_id, is_practiced,
                                  is_wrong, is_favorite, is_mastered, updated_at)
            VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, FALSE), COALESCE($5, FALSE),
                    COALESCE($6, FALSE), COALESCE($7, FALSE), NOW())
            ON CONFLICT (device_id, question_id) DO UPDATE SET
                chapter_id = COALESCE($3, progress.chapter_id),
                is_practiced = COALESCE($4, progress.is_practiced),
                is_wrong = COALESCE($5, progress.is_wrong),
                is_favorite = COALESCE($6, progress.is_favorite),
                is_mastered = COALESCE($7, progress.is_mastered),
                updated_at = NOW()
            RETURNING device_id, question_id, chapter_id, is_practiced, is_wrong,
                      is_favorite, is_mastered, updated_at
            "#,
        )
        .bind(device_id.as_str())
        .bind(&patch.question_id)
        .bind(patch.chapter_id.as_deref())
        .bind(patch.is_practiced)
        .bind(patch.is_wrong)
        .bind(patch.is_favorite)
        .bind(patch.is_mastered)
        .fetch_one(&self.pool)
        .await?;

        row.into_record()
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    /// Clear the practiced flag on every row of a chapter
    pub async fn reset_chapter(&self, device_id: &DeviceId, chapter_id: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE progress
            SET is_practiced = FALSE, updated_at = NOW()
            WHERE device_id = $1 AND chapter_id = $2
            "#,
        )
        .bind(device_id.as_str())
        .bind(chapter_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete every progress row of a device
    pub async fn delete_progress(&self, device_id: &DeviceId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM progress WHERE device_id = $1")
            .bind(device_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // === Exam History Repository ===

    /// Get the newest exam results of a device
    pub async fn list_exam_history(
        &self,
        device_id: &DeviceId,
        limit: i64,
    ) -> Result<Vec<ExamHistoryEntry>> {
        let rows = sqlx::query_as::<_, DbExamEntry>(
            r#"
            SELECT id, device_id, score, total, correct, wrong, used_time, created_at
            FROM exam_history
            WHERE device_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(device_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(DbExamEntry::to_entry).collect())
    }

    /// Append one exam result
    pub async fn insert_exam_result(
        &self,
        device_id: &DeviceId,
        entry: &ExamHistoryEntry,
    ) -> Result<i64> {
        let column = |name: &str, value: u32| {
            i32::try_from(value).map_err(|_| ApiError::BadRequest(format!("{name} out of range")))
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO exam_history (device_id, score, total, correct, wrong, used_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(device_id.as_str())
        .bind(column("score", entry.score)?)
        .bind(column("total", entry.total)?)
        .bind(column("correct", entry.correct)?)
        .bind(column("wrong", entry.wrong)?)
        .bind(column("used_time", entry.used_time)?)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Delete every exam result of a device
    pub async fn delete_exam_history(&self, device_id: &DeviceId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM exam_history WHERE device_id = $1")
            .bind(device_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // === Catalog Repository ===

    /// Get all chapters in display order
    pub async fn list_chapters(&self) -> Result<Vec<Chapter>> {
        let rows = sqlx::query_as::<_, DbChapter>(
            r#"
            SELECT id, name, sort_order
            FROM chapters
            ORDER BY sort_order, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Chapter::from).collect())
    }

    pub async fn insert_chapter(&self, chapter: &Chapter) -> Result<()> {
        sqlx::query("INSERT INTO chapters (id, name, sort_order) VALUES ($1, $2, $3)")
            .bind(&chapter.id)
            .bind(&chapter.name)
            .bind(chapter.order)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::conflict_on_duplicate(e, format!("chapter {}", chapter.id)))?;

        Ok(())
    }

    /// Delete a chapter. Returns false when it did not exist.
    pub async fn delete_chapter(&self, chapter_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(chapter_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get all questions
    pub async fn list_questions(&self) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, DbQuestion>(
            r#"
            SELECT id, chapter_id, type, question, options, answer, explanation
            FROM questions
            ORDER BY chapter_id, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                row.into_question()
                    .map_err(|e| ApiError::Internal(e.to_string()))
            })
            .collect()
    }

    pub async fn insert_question(&self, question: &Question) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO questions (id, chapter_id, type, question, options, answer, explanation)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&question.id)
        .bind(&question.chapter_id)
        .bind(question.kind.as_str())
        .bind(&question.question)
        .bind(options_text(question)?)
        .bind(&question.answer)
        .bind(&question.explanation)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::conflict_on_duplicate(e, format!("question {}", question.id)))?;

        Ok(())
    }

    /// Replace a question. Returns false when it did not exist.
    pub async fn update_question(&self, question: &Question) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE questions
            SET chapter_id = $2, type = $3, question = $4, options = $5,
                answer = $6, explanation = $7
            WHERE id = $1
            "#,
        )
        .bind(&question.id)
        .bind(&question.chapter_id)
        .bind(question.kind.as_str())
        .bind(&question.question)
        .bind(options_text(question)?)
        .bind(&question.answer)
        .bind(&question.explanation)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a question. Returns false when it did not exist.
    pub async fn delete_question(&self, question_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(question_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn options_text(question: &Question) -> Result<String> {
    serde_json::to_string(&question.options).map_err(|e| ApiError::Internal(e.to_string()))
}
