use auth::CurrentUser;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{header, StatusCode};
use serde::Serialize;
use serde_json::json;
use storage::Store;
use tokio_util::io::ReaderStream;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::result::Result;
use crate::route::AppState;

pub fn route() -> Router<AppState> {
    Router::new()
        .route(api::path::STREAMS, post(create))
        .route(api::path::STREAMS_LIVE, get(live))
        .route(api::path::STREAMS_USER, get(user_streams))
        .route("/streams/by-key/{key}", get(by_key))
        .route("/streams/{id}", get(show).put(update).delete(destroy))
        .route("/streams/{id}/play", get(play))
        .route("/streams/{id}/thumbnail", get(thumbnail))
        .route("/streams/{id}/qualities", get(qualities))
}

#[derive(Serialize)]
struct CreateStreamResponse {
    stream: db::Stream,
    stream_url: String,
    hls_url: String,
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<api::request::CreateStream>,
) -> Result<(StatusCode, Json<CreateStreamResponse>)> {
    if req.title.len() < 3 || req.title.len() > 255 {
        return Err(AppError::bad_request("title must be 3-255 characters"));
    }
    if req.description.len() > 1000 {
        return Err(AppError::bad_request("description too long"));
    }

    // The key is the broadcaster's ingest secret; opaque 128 bits of hex.
    let stream_key = Uuid::new_v4().simple().to_string();
    let stream = state
        .streams
        .create(user.id, &stream_key, &req.title, &req.description)
        .await?;
    info!(stream_id = %stream.id, user_id = %user.id, "stream created");

    let response = CreateStreamResponse {
        stream_url: api::path::srt_publish(&state.config.srt_public_addr(), &stream_key),
        hls_url: api::path::hls_master(
            &state.config.public_base_url,
            &state.config.buckets.live,
            &stream_key,
        ),
        stream,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

async fn live(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let streams = state.streams.list_live().await?;
    Ok(Json(json!({ "streams": streams })))
}

async fn user_streams(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<serde_json::Value>> {
    let streams = state.streams.list_by_user(user.id).await?;
    Ok(Json(json!({ "streams": streams, "total": streams.len() })))
}

async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<db::Stream>> {
    match state.streams.get(id).await? {
        Some(stream) => Ok(Json(stream)),
        None => Err(AppError::resource_not_found("Stream not found")),
    }
}

async fn by_key(State(state): State<AppState>, Path(key): Path<String>) -> Result<Json<db::Stream>> {
    match state.streams.get_by_key(&key).await? {
        Some(stream) => Ok(Json(stream)),
        None => Err(AppError::resource_not_found("Stream not found")),
    }
}

/// Playback info for viewers; only meaningful while the stream is live.
async fn play(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<serde_json::Value>> {
    let stream = state
        .streams
        .get(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("Stream not found"))?;
    if !stream.is_live() {
        return Err(AppError::forbidden("Stream is not currently live"));
    }

    let hls_url = api::path::hls_master(
        &state.config.public_base_url,
        &state.config.buckets.live,
        &stream.stream_key,
    );
    Ok(Json(json!({
        "stream_id": stream.id,
        "title": stream.title,
        "description": stream.description,
        "username": stream.username,
        "status": stream.status,
        "hls_url": hls_url,
        "viewer_count": stream.viewer_count,
        "started_at": stream.started_at,
        "thumbnail_url": stream.thumbnail_url,
        "available_qualities": stream.available_qualities,
        "is_live": true,
    })))
}

/// Streams the live thumbnail JPEG with a short cache window so viewers see
/// a fresh frame roughly twice a minute.
async fn thumbnail(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    let stream = state
        .streams
        .get(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("Stream not found"))?;

    let key = format!("live-segments/{}/thumbnail.jpg", stream.stream_key);
    let body = state
        .live_store
        .get(&key)
        .await
        .map_err(|_| AppError::resource_not_found("Thumbnail not found"))?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, body.size)
        .header(header::CACHE_CONTROL, "public, max-age=30")
        .body(Body::from_stream(ReaderStream::new(body.reader)))?)
}

async fn qualities(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let stream = state
        .streams
        .get(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("Stream not found"))?;
    Ok(Json(json!({
        "stream_id": stream.id,
        "available_qualities": stream.available_qualities,
        "status": stream.status,
    })))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
    Json(req): Json<api::request::UpdateStream>,
) -> Result<Json<serde_json::Value>> {
    let stream = state
        .streams
        .get(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("Stream not found"))?;
    if stream.user_id != user.id {
        return Err(AppError::forbidden("Not authorized to update this stream"));
    }
    if req.title.is_empty() {
        return Err(AppError::bad_request("title is required"));
    }

    state
        .streams
        .update_info(id, user.id, &req.title, &req.description)
        .await?;
    let updated = state.streams.get(id).await?;
    Ok(Json(json!({ "stream": updated })))
}

/// Deletes a stream and cascades into its live segments.
async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> Result<Json<api::response::Message>> {
    let stream = state
        .streams
        .get(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("Stream not found"))?;
    if stream.user_id != user.id {
        return Err(AppError::forbidden("Not authorized to delete this stream"));
    }

    let deleted = state.streams.delete(id, user.id).await?;
    if deleted == 0 {
        return Err(AppError::resource_not_found("Stream not found"));
    }

    // Segment removal happens off the request path; a failure leaves
    // orphans for the cleanup webhook or operator tooling.
    let store = state.live_store.clone();
    let prefix = format!("live-segments/{}/", stream.stream_key);
    tokio::spawn(async move {
        if let Err(err) = store.delete_prefix(&prefix).await {
            error!(prefix, %err, "failed to delete live segments");
        }
    });

    info!(stream_id = %id, "stream deleted");
    Ok(Json(api::response::Message::new("Stream deleted successfully")))
}
