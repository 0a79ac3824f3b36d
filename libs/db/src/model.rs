use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::status;

/// A broadcaster-owned ingest channel.
#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct Stream {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stream_key: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub viewer_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_url: Option<String>,
    pub available_qualities: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Resolved through the user join on read paths; absent on plain lookups.
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Stream {
    pub fn is_live(&self) -> bool {
        self.status == status::stream::LIVE
    }
}

/// One capture of one live session.
#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct Recording {
    pub id: Uuid,
    pub stream_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<Uuid>,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    pub duration: i32,
    pub file_size: i64,
    pub status: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A durable on-demand video asset.
#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct Video {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub source: String,
    pub status: String,
    pub visibility: String,
    pub file_path: String,
    pub thumbnail_path: String,
    pub duration: i32,
    pub file_size: i64,
    pub view_count: i32,
    pub like_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Video {
    /// Private videos are readable by their owner only.
    pub fn readable_by(&self, requester: Option<Uuid>) -> bool {
        self.visibility != status::visibility::PRIVATE || requester == Some(self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_with_visibility(visibility: &str, owner: Uuid) -> Video {
        Video {
            id: Uuid::new_v4(),
            user_id: owner,
            recording_id: None,
            stream_id: None,
            title: "t".to_string(),
            description: String::new(),
            category: String::new(),
            tags: vec![],
            source: status::source::UPLOAD.to_string(),
            status: status::video::READY.to_string(),
            visibility: visibility.to_string(),
            file_path: "f.mp4".to_string(),
            thumbnail_path: String::new(),
            duration: 0,
            file_size: 0,
            view_count: 0,
            like_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            published_at: None,
            username: None,
        }
    }

    #[test]
    fn private_videos_are_owner_only() {
        let owner = Uuid::new_v4();
        let video = video_with_visibility(status::visibility::PRIVATE, owner);

        assert!(video.readable_by(Some(owner)));
        assert!(!video.readable_by(Some(Uuid::new_v4())));
        assert!(!video.readable_by(None));
    }

    #[test]
    fn public_and_unlisted_videos_are_readable_by_anyone() {
        let owner = Uuid::new_v4();
        for visibility in [status::visibility::PUBLIC, status::visibility::UNLISTED] {
            let video = video_with_visibility(visibility, owner);
            assert!(video.readable_by(None));
            assert!(video.readable_by(Some(Uuid::new_v4())));
        }
    }
}
