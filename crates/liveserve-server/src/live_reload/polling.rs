//! Poll endpoint.
//!
//! `GET /livereload/{path}` answers `1` when a reload is pending for the
//! page and `0` otherwise.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::error::ServerError;
use crate::state::AppState;

/// Handle GET /livereload/ and GET /livereload.
pub(crate) async fn poll_root(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServerError> {
    poll_impl(&state, "/")
}

/// Handle GET /livereload/{path}.
pub(crate) async fn poll(
    Path(path): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServerError> {
    poll_impl(&state, &format!("/{path}"))
}

fn poll_impl(state: &AppState, path: &str) -> Result<impl IntoResponse + use<>, ServerError> {
    let reload = state.engine.poll(path)?;
    if reload {
        tracing::debug!(path, "Poll answered with reload");
    }
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        if reload { "1" } else { "0" },
    ))
}
