use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::routing::get;
use axum::Router;
use db::RecordingRepo;
use storage::Store;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info_span};

use crate::monitor::Monitor;
use crate::route::AppState;

pub mod assemble;
pub mod config;
pub mod monitor;

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

    let live_store = Arc::new(
        storage::open(&cfg.storage, &cfg.buckets.live)
            .await
            .expect("live bucket store"),
    );
    let recordings_store = Arc::new(
        storage::open(&cfg.storage, &cfg.buckets.recordings)
            .await
            .expect("recordings bucket store"),
    );
    // The recordings bucket stays private; only service credentials read it.
    if let Err(err) = recordings_store.ensure_bucket().await {
        error!(%err, "failed to ensure recordings bucket");
    }

    let recordings = RecordingRepo::new(pool);
    let monitor = Monitor::new(&cfg, live_store, recordings_store, recordings.clone());

    let snapshot_cancel = CancellationToken::new();
    tokio::spawn(monitor.clone().run_snapshot(snapshot_cancel.clone()));

    let app_state = AppState {
        monitor,
        recordings,
    };

    let app = Router::new()
        .merge(route::webhook::route())
        .merge(route::recording::route())
        .route(api::path::HEALTH, get(health))
        .with_state(app_state)
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
    snapshot_cancel.cancel();
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "healthy", "service": "recorderd" }))
}
