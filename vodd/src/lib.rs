use std::future::Future;
use std::sync::Arc;

use auth::{AuthState, InternalKeyValidate};
use axum::extract::Request;
use axum::routing::get;
use axum::Router;
use db::{RecordingRepo, VideoRepo};
use storage::Store;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;
use tracing::{error, info_span, warn};

use crate::route::AppState;

pub mod config;

mod error;
mod result;
mod route;

pub use config::Config;

pub async fn serve<F>(cfg: Config, listener: TcpListener, signal: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let pool = db::connect(&cfg.database.url)
        .await
        .expect("database connection failed");

    let videos_store = Arc::new(
        storage::open(&cfg.storage, &cfg.buckets.videos)
            .await
            .expect("videos bucket store"),
    );
    if let Err(err) = videos_store.ensure_bucket().await {
        error!(%err, "failed to ensure videos bucket");
    }
    if let Err(err) = videos_store.set_public_read().await {
        warn!(%err, "failed to set public read policy on videos bucket");
    }

    let app_state = AppState {
        config: cfg.clone(),
        videos: VideoRepo::new(pool.clone()),
        recordings: RecordingRepo::new(pool),
        videos_store,
    };
    let auth_state = AuthState::new(&cfg.auth.jwt_secret);
    let internal_key_layer = ValidateRequestHeaderLayer::custom(InternalKeyValidate::new(
        cfg.auth.internal_api_key.clone(),
    ));

    let app = Router::new()
        .merge(route::import::route().layer(internal_key_layer))
        .merge(route::video::route())
        .route(api::path::HEALTH, get(health))
        .with_state(app_state)
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth::identify,
        ))
        .layer(if cfg.http.cors {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        })
        .layer(axum::middleware::from_fn(http_log::log_request_response))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                info_span!(
                    "http_request",
                    uri = ?request.uri(),
                    method = ?request.method(),
                )
            }),
        );

    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
        .unwrap_or_else(|e| error!("Application error: {e}"));
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "healthy", "service": "vodd" }))
}
