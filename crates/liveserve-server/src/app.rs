//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use liveserve_core::{ReloadMode, SOCKET_ENDPOINT};
use tower::ServiceBuilder;

use crate::live_reload;
use crate::middleware::{logging, no_cache};
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
///
/// Only the endpoint of the configured transport is mounted.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    if state.live_reload {
        router = match state.engine.mode() {
            ReloadMode::Poll => router
                .route("/livereload", get(live_reload::poll_root))
                .route("/livereload/", get(live_reload::poll_root))
                .route("/livereload/{*path}", get(live_reload::poll)),
            ReloadMode::Socket => router.route(SOCKET_ENDPOINT, get(live_reload::ws_handler)),
        };
    }

    // Everything else is served from the root
    router = router.fallback(static_files::serve_resource);

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    Arc::clone(&state),
                    logging::log_requests,
                ))
                .layer(no_cache::cache_control_layer())
                .layer(no_cache::pragma_layer())
                .layer(no_cache::expires_layer()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use liveserve_core::WatchEvent;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn get_text(router: &Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_no_cache_headers_on_every_response() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
        let router = create_router(test_state(dir.path(), ReloadMode::Socket, true));

        for uri in ["/", "/missing.html"] {
            let response = router
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            let headers = response.headers();
            assert_eq!(
                headers[header::CACHE_CONTROL],
                "no-cache, no-store, must-revalidate"
            );
            assert_eq!(headers[header::PRAGMA], "no-cache");
            assert_eq!(headers[header::EXPIRES], "0");
        }
    }

    #[tokio::test]
    async fn test_poll_endpoint_reports_pending_reload() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("blog")).unwrap();
        fs::write(dir.path().join("blog/post.html"), "<p>post</p>").unwrap();
        let state = test_state(dir.path(), ReloadMode::Poll, true);
        let router = create_router(Arc::clone(&state));

        assert_eq!(get_text(&router, "/livereload/blog/").await, (StatusCode::OK, "0".to_owned()));

        state
            .engine
            .on_event(WatchEvent::Modified(state.root().join("blog/post.html")));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(get_text(&router, "/livereload/").await, (StatusCode::OK, "0".to_owned()));
        assert_eq!(get_text(&router, "/livereload/blog/").await, (StatusCode::OK, "1".to_owned()));
        assert_eq!(get_text(&router, "/livereload/blog/").await, (StatusCode::OK, "0".to_owned()));
    }

    #[tokio::test]
    async fn test_poll_endpoint_rejects_escape() {
        let dir = TempDir::new().unwrap();
        let router = create_router(test_state(dir.path(), ReloadMode::Poll, true));

        let (status, _) = get_text(&router, "/livereload/..%2F..%2Fetc/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_only_active_transport_is_mounted() {
        let dir = TempDir::new().unwrap();

        let socket = create_router(test_state(dir.path(), ReloadMode::Socket, true));
        let (status, _) = get_text(&socket, "/livereload/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let poll = create_router(test_state(dir.path(), ReloadMode::Poll, true));
        let (status, _) = get_text(&poll, SOCKET_ENDPOINT).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
