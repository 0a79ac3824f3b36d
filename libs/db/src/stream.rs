use sqlx::PgPool;
use uuid::Uuid;

use crate::model::Stream;
use crate::status;

/// The rendition names a fresh stream advertises, low to high.
pub const DEFAULT_QUALITIES: [&str; 4] = ["360p", "480p", "720p", "1080p"];

// Reads that expose `username` pre-filter the streams table in a CTE before
// joining the user table, which may live behind a foreign-data-wrapper link.
const SELECT_BY_ID: &str = r#"
WITH target_stream AS (
    SELECT * FROM streams WHERE id = $1
)
SELECT ts.*, COALESCE(u.username, 'Unknown') AS username
FROM target_stream ts
LEFT JOIN users u ON ts.user_id = u.id
"#;

const SELECT_BY_USER: &str = r#"
WITH filtered_streams AS (
    SELECT * FROM streams
    WHERE user_id = $1
    ORDER BY created_at DESC
)
SELECT fs.*, COALESCE(u.username, 'Unknown') AS username
FROM filtered_streams fs
LEFT JOIN users u ON fs.user_id = u.id
"#;

const SELECT_LIVE: &str = r#"
WITH filtered_streams AS (
    SELECT * FROM streams
    WHERE status = 'live'
    ORDER BY started_at DESC
    LIMIT 100
)
SELECT fs.*, COALESCE(u.username, 'Unknown') AS username
FROM filtered_streams fs
LEFT JOIN users u ON fs.user_id = u.id
"#;

#[derive(Clone)]
pub struct StreamRepo {
    pool: PgPool,
}

impl StreamRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        stream_key: &str,
        title: &str,
        description: &str,
    ) -> Result<Stream, sqlx::Error> {
        let qualities: Vec<String> = DEFAULT_QUALITIES.iter().map(|q| q.to_string()).collect();
        sqlx::query_as(
            r#"
            INSERT INTO streams (id, user_id, stream_key, title, description, status, viewer_count, available_qualities, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(stream_key)
        .bind(title)
        .bind(description)
        .bind(status::stream::OFFLINE)
        .bind(qualities)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Stream>, sqlx::Error> {
        sqlx::query_as(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_by_key(&self, stream_key: &str) -> Result<Option<Stream>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM streams WHERE stream_key = $1")
            .bind(stream_key)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_live(&self) -> Result<Vec<Stream>, sqlx::Error> {
        sqlx::query_as(SELECT_LIVE).fetch_all(&self.pool).await
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Stream>, sqlx::Error> {
        sqlx::query_as(SELECT_BY_USER)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Title/description update, owner-scoped. Returns affected row count so
    /// callers can distinguish missing rows from foreign ones.
    pub async fn update_info(
        &self,
        id: Uuid,
        user_id: Uuid,
        title: &str,
        description: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE streams SET title = $1, description = $2, updated_at = now() WHERE id = $3 AND user_id = $4",
        )
        .bind(title)
        .bind(description)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Transition to live. Idempotent: an already-set `started_at` is kept so
    /// reconnects within one session never move the session start.
    pub async fn set_live(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE streams
            SET status = $1, started_at = COALESCE(started_at, now()), ended_at = NULL, updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(status::stream::LIVE)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_offline(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE streams SET status = $1, ended_at = now(), updated_at = now() WHERE id = $2",
        )
        .bind(status::stream::OFFLINE)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_thumbnail(&self, id: Uuid, thumbnail_url: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE streams SET thumbnail_url = $1, updated_at = now() WHERE id = $2")
            .bind(thumbnail_url)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_hls_url(&self, id: Uuid, hls_url: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE streams SET hls_url = $1, updated_at = now() WHERE id = $2")
            .bind(hls_url)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM streams WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
