use sqlx::PgPool;
use uuid::Uuid;

use crate::model::Video;

const SELECT_BY_ID: &str = r#"
WITH target_video AS (
    SELECT * FROM videos WHERE id = $1
)
SELECT tv.*, COALESCE(u.username, 'Unknown') AS username
FROM target_video tv
LEFT JOIN users u ON tv.user_id = u.id
"#;

// `$1` is the optional requester: anonymous callers see public videos only,
// authenticated callers additionally see their own.
const SELECT_ALL: &str = r#"
WITH filtered_videos AS (
    SELECT * FROM videos
    WHERE visibility = 'public' OR ($1::uuid IS NOT NULL AND user_id = $1)
    ORDER BY created_at DESC
    LIMIT $2 OFFSET $3
)
SELECT fv.*, COALESCE(u.username, 'Unknown') AS username
FROM filtered_videos fv
LEFT JOIN users u ON fv.user_id = u.id
"#;

const SELECT_BY_USER: &str = r#"
WITH filtered_videos AS (
    SELECT * FROM videos
    WHERE user_id = $1
    ORDER BY created_at DESC
    LIMIT $2 OFFSET $3
)
SELECT fv.*, COALESCE(u.username, 'Unknown') AS username
FROM filtered_videos fv
LEFT JOIN users u ON fv.user_id = u.id
"#;

#[derive(Clone)]
pub struct VideoRepo {
    pool: PgPool,
}

impl VideoRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the full row. The NULL-allowing unique index on
    /// `recording_id` makes concurrent imports of the same recording
    /// collapse to one row: the losing insert returns `None`.
    pub async fn create(&self, video: &Video) -> Result<Option<Video>, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO videos (
                id, user_id, recording_id, stream_id,
                title, description, category, tags,
                source, status, visibility,
                file_path, thumbnail_path, duration, file_size,
                view_count, like_count,
                created_at, updated_at, published_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
            )
            ON CONFLICT (recording_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(video.id)
        .bind(video.user_id)
        .bind(video.recording_id)
        .bind(video.stream_id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.category)
        .bind(&video.tags)
        .bind(&video.source)
        .bind(&video.status)
        .bind(&video.visibility)
        .bind(&video.file_path)
        .bind(&video.thumbnail_path)
        .bind(video.duration)
        .bind(video.file_size)
        .bind(video.view_count)
        .bind(video.like_count)
        .bind(video.created_at)
        .bind(video.updated_at)
        .bind(video.published_at)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Video>, sqlx::Error> {
        sqlx::query_as(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_by_recording(&self, recording_id: Uuid) -> Result<Option<Video>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM videos WHERE recording_id = $1")
            .bind(recording_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_all(
        &self,
        viewer: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Video>, i64), sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM videos WHERE visibility = 'public' OR ($1::uuid IS NOT NULL AND user_id = $1)",
        )
        .bind(viewer)
        .fetch_one(&self.pool)
        .await?;
        let videos = sqlx::query_as(SELECT_ALL)
            .bind(viewer)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok((videos, total))
    }

    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Video>, i64), sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM videos WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let videos = sqlx::query_as(SELECT_BY_USER)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok((videos, total))
    }

    /// Owner-scoped metadata update; mutable fields only.
    pub async fn update_meta(&self, video: &Video) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET title = $1, description = $2, category = $3, tags = $4, visibility = $5, updated_at = now()
            WHERE id = $6 AND user_id = $7
            "#,
        )
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.category)
        .bind(&video.tags)
        .bind(&video.visibility)
        .bind(video.id)
        .bind(video.user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn increment_views(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE videos SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn increment_likes(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE videos SET like_count = like_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
