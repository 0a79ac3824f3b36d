use std::future::Future;
use std::sync::Arc;

use auth::AuthState;
use axum::extract::Request;
use axum::routing::get;
use axum::Router;
use db::StreamRepo;
use storage::Store;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info_span, warn};

use crate::hook::StreamEventHook;
use crate::route::AppState;

pub mod config;
pub mod transcode;

mod error;
mod ingest;
mod hook;
mod metrics;
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

    let live_store = Arc::new(
        storage::open(&cfg.storage, &cfg.buckets.live)
            .await
            .expect("live bucket store"),
    );
    if let Err(err) = live_store.ensure_bucket().await {
        error!(%err, "failed to ensure live bucket");
    }
    // Viewers fetch playlists and segments straight from the bucket.
    if let Err(err) = live_store.set_public_read().await {
        warn!(%err, "failed to set public read policy on live bucket");
    }

    let app_state = AppState {
        config: cfg.clone(),
        streams: StreamRepo::new(pool),
        live_store,
        stream_events: StreamEventHook::new(&cfg.webhook.recording_service_url),
    };
    let auth_state = AuthState::new(&cfg.auth.jwt_secret);

    let srt_cancel = CancellationToken::new();
    {
        let state = app_state.clone();
        let cancel = srt_cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = ingest::serve(state, cancel).await {
                error!(%err, "srt ingest server failed");
            }
        });
    }

    let app = Router::new()
        .merge(route::stream::route())
        .merge(route::webhook::route())
        .route(api::path::HEALTH, get(health))
        .route("/metrics", get(metrics_text))
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
    srt_cancel.cancel();
}

pub fn metrics_register() {
    metrics::REGISTRY
        .register(Box::new(metrics::SESSION.clone()))
        .unwrap();
    metrics::REGISTRY
        .register(Box::new(metrics::SEGMENT.clone()))
        .unwrap();
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "healthy", "service": "streamd" }))
}

async fn metrics_text() -> String {
    metrics::ENCODER
        .encode_to_string(&metrics::REGISTRY.gather())
        .unwrap_or_default()
}
