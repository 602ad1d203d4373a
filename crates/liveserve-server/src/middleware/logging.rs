//! Request logging.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use liveserve_core::POLL_ENDPOINT;

use crate::state::AppState;

/// Log method, path, status and latency of each request.
///
/// Polls are skipped since every open page sends one every few seconds.
pub(crate) async fn log_requests(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if state.suppress_logs || is_poll(req.uri().path()) {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();
    let response = next.run(req).await;

    tracing::info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        latency = ?started.elapsed(),
        "Request"
    );
    response
}

fn is_poll(path: &str) -> bool {
    path.strip_prefix(POLL_ENDPOINT)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
