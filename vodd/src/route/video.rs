use auth::{CurrentUser, MaybeUser};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{header, StatusCode};
use serde_json::json;
use storage::Store;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::result::Result;
use crate::route::AppState;

pub fn route() -> Router<AppState> {
    Router::new()
        .route(api::path::VIDEOS, get(index))
        .route("/videos/user", get(user_videos))
        .route("/videos/{id}", get(show).put(update).delete(destroy))
        .route("/videos/{id}/play", get(play))
        .route("/videos/{id}/stream", get(stream_file))
        .route("/videos/{id}/thumbnail", get(thumbnail))
        .route("/videos/{id}/view", post(add_view))
        .route("/videos/{id}/like", post(like))
}

/// Loads a video and enforces the private-visibility rule in one place.
async fn fetch_readable(
    state: &AppState,
    id: Uuid,
    requester: Option<Uuid>,
) -> Result<db::Video> {
    let video = state
        .videos
        .get(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("Video not found"))?;
    if !video.readable_by(requester) {
        return Err(AppError::forbidden("This video is private"));
    }
    Ok(video)
}

/// Public catalogue: everyone's public videos plus the requester's own.
async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(page): Query<api::request::Page>,
) -> Result<Json<serde_json::Value>> {
    let page = page.clamped();
    let (videos, total) = state
        .videos
        .list_all(user.map(|u| u.id), page.limit, page.offset)
        .await?;
    Ok(Json(json!({
        "videos": videos,
        "total": total,
        "page": page.offset / page.limit + 1,
        "limit": page.limit,
    })))
}

async fn user_videos(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<api::request::Page>,
) -> Result<Json<serde_json::Value>> {
    let page = page.clamped();
    let (videos, total) = state
        .videos
        .list_by_user(user.id, page.limit, page.offset)
        .await?;
    Ok(Json(json!({
        "videos": videos,
        "total": total,
        "page": page.offset / page.limit + 1,
        "limit": page.limit,
    })))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<serde_json::Value>> {
    let video = fetch_readable(&state, id, user.map(|u| u.id)).await?;
    Ok(Json(json!({ "video": video })))
}

/// Playback descriptor: URLs plus the metadata a player surface needs.
async fn play(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<serde_json::Value>> {
    let video = fetch_readable(&state, id, user.map(|u| u.id)).await?;

    let thumbnail_url = if video.thumbnail_path.is_empty() {
        None
    } else {
        Some(format!("/videos/{id}/thumbnail"))
    };
    Ok(Json(json!({
        "video_url": format!("/videos/{id}/stream"),
        "thumbnail_url": thumbnail_url,
        "video": {
            "id": video.id,
            "title": video.title,
            "description": video.description,
            "duration": video.duration,
            "view_count": video.view_count,
            "like_count": video.like_count,
            "created_at": video.created_at,
            "visibility": video.visibility,
            "tags": video.tags,
            "category": video.category,
        },
    })))
}

/// Streams the MP4 straight out of the videos bucket.
async fn stream_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    MaybeUser(user): MaybeUser,
) -> Result<Response> {
    let video = fetch_readable(&state, id, user.map(|u| u.id)).await?;

    let body = state
        .videos_store
        .get(&video.file_path)
        .await
        .map_err(|err| AppError::upstream(format!("failed to open video: {err}")))?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, body.size)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "public, max-age=31536000")
        .body(Body::from_stream(ReaderStream::new(body.reader)))?)
}

async fn thumbnail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    MaybeUser(user): MaybeUser,
) -> Result<Response> {
    let video = fetch_readable(&state, id, user.map(|u| u.id)).await?;
    if video.thumbnail_path.is_empty() {
        return Err(AppError::resource_not_found("Thumbnail not found"));
    }

    let body = state
        .videos_store
        .get(&video.thumbnail_path)
        .await
        .map_err(|err| AppError::upstream(format!("failed to open thumbnail: {err}")))?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, body.size)
        .header(header::CACHE_CONTROL, "public, max-age=31536000")
        .body(Body::from_stream(ReaderStream::new(body.reader)))?)
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(req): Json<api::request::UpdateVideo>,
) -> Result<Json<api::response::Message>> {
    let mut video = state
        .videos
        .get(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("Video not found"))?;
    if video.user_id != user.id {
        return Err(AppError::forbidden("Not authorized"));
    }

    if let Some(title) = req.title.filter(|t| !t.is_empty()) {
        video.title = title;
    }
    if let Some(description) = req.description {
        video.description = description;
    }
    if let Some(category) = req.category {
        video.category = category;
    }
    if let Some(tags) = req.tags {
        video.tags = tags;
    }
    if let Some(visibility) = req.visibility {
        if ![
            db::status::visibility::PUBLIC,
            db::status::visibility::PRIVATE,
            db::status::visibility::UNLISTED,
        ]
        .contains(&visibility.as_str())
        {
            return Err(AppError::bad_request("invalid visibility"));
        }
        video.visibility = visibility;
    }

    let updated = state.videos.update_meta(&video).await?;
    if updated == 0 {
        return Err(AppError::resource_not_found("Video not found"));
    }
    Ok(Json(api::response::Message::new("Video updated successfully")))
}

/// Deletes the row and cascades into the stored objects.
async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> Result<Json<api::response::Message>> {
    let video = state
        .videos
        .get(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("Video not found"))?;
    if video.user_id != user.id {
        return Err(AppError::forbidden("Not authorized"));
    }

    if let Err(err) = state.videos_store.delete(&video.file_path).await {
        warn!(video_id = %id, %err, "failed to delete video object");
    }
    if !video.thumbnail_path.is_empty() {
        if let Err(err) = state.videos_store.delete(&video.thumbnail_path).await {
            warn!(video_id = %id, %err, "failed to delete thumbnail object");
        }
    }

    let deleted = state.videos.delete(id, user.id).await?;
    if deleted == 0 {
        return Err(AppError::resource_not_found("Video not found"));
    }
    info!(video_id = %id, "video deleted");
    Ok(Json(api::response::Message::new("Video deleted successfully")))
}

async fn add_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<api::response::Message>> {
    let updated = state.videos.increment_views(id).await?;
    if updated == 0 {
        return Err(AppError::resource_not_found("Video not found"));
    }
    Ok(Json(api::response::Message::new("View count incremented")))
}

async fn like(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: CurrentUser,
) -> Result<Json<api::response::Message>> {
    let updated = state.videos.increment_likes(id).await?;
    if updated == 0 {
        return Err(AppError::resource_not_found("Video not found"));
    }
    Ok(Json(api::response::Message::new("Video liked")))
}
