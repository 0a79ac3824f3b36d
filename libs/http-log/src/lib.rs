use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::debug;

/// Request/response logging middleware shared by every service.
///
/// Logs method, path, response status and handler latency at debug level.
pub async fn log_request_response(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let res = next.run(req).await;

    debug!(
        %method,
        %uri,
        status = res.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "http request"
    );

    res
}
