use sqlx::PgPool;
use uuid::Uuid;

use crate::model::Recording;
use crate::status;

#[derive(Clone)]
pub struct RecordingRepo {
    pool: PgPool,
}

impl RecordingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, stream_id: Uuid, file_path: &str) -> Result<Recording, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO recordings (id, stream_id, file_path, duration, file_size, status, started_at)
            VALUES ($1, $2, $3, 0, 0, $4, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(stream_id)
        .bind(file_path)
        .bind(status::recording::RECORDING)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Recording>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM recordings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(&self) -> Result<Vec<Recording>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM recordings ORDER BY started_at DESC")
            .fetch_all(&self.pool)
            .await
    }

    /// Terminal transitions only fire from `recording`; the predicate keeps
    /// the status monotone even when a late cancel races a failure path.
    pub async fn finalize(&self, id: Uuid, terminal_status: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE recordings
            SET status = $1, completed_at = now()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(terminal_status)
        .bind(id)
        .bind(status::recording::RECORDING)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_media(
        &self,
        id: Uuid,
        thumbnail_path: Option<&str>,
        duration: i32,
        file_size: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE recordings SET thumbnail_path = $1, duration = $2, file_size = $3 WHERE id = $4",
        )
        .bind(thumbnail_path)
        .bind(duration)
        .bind(file_size)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Best-effort backlink written after a successful VOD import.
    pub async fn set_video_id(&self, id: Uuid, video_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE recordings SET video_id = $1 WHERE id = $2")
            .bind(video_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
