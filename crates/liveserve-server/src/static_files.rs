//! Static file serving.
//!
//! Resolves request paths against the served root, serves files, index
//! pages and directory listings, and injects the live reload bootstrap
//! into HTML.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use liveserve_core::{CanonicalPath, INDEX_FILES, SitePath};
use percent_encoding::percent_decode_str;

use crate::error::ServerError;
use crate::listing;
use crate::state::AppState;

/// What a request path resolves to.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Resource {
    /// A file on disk, belonging to `page`.
    File { path: PathBuf, page: CanonicalPath },
    /// A directory without an index page.
    Listing { dir: PathBuf, page: CanonicalPath },
    /// A directory requested without its trailing slash.
    DirectoryRedirect,
}

/// Percent-decode a request path.
pub(crate) fn decode_path(raw: &str) -> Result<Cow<'_, str>, ServerError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ServerError::NotFound(raw.to_owned()))
}

/// Resolve a decoded request path to a resource.
///
/// Names are matched case-sensitively. An extension-less path that does
/// not exist falls back to a sibling `<path>.js`.
pub(crate) fn locate(root: &Path, raw: &str) -> Result<Resource, ServerError> {
    let site_path = liveserve_core::resolve(root, raw)?;

    if site_path.exists_in(root) {
        let fs_path = site_path.to_fs_path(root);
        if !fs_path.is_dir() {
            return Ok(Resource::File {
                page: site_path.page(root),
                path: fs_path,
            });
        }
        if !site_path.is_root() && !site_path.has_trailing_slash() {
            return Ok(Resource::DirectoryRedirect);
        }

        let page = site_path.page(root);
        if let Some(index) = find_index(root, &site_path) {
            return Ok(Resource::File { path: index, page });
        }
        return Ok(Resource::Listing { dir: fs_path, page });
    }

    if site_path.extension().is_none()
        && let Some(script) = site_path.with_suffix(".js")
        && script.exists_in(root)
    {
        let path = script.to_fs_path(root);
        if path.is_file() {
            return Ok(Resource::File {
                page: script.page(root),
                path,
            });
        }
    }

    Err(ServerError::NotFound(raw.to_owned()))
}

fn find_index(root: &Path, dir: &SitePath) -> Option<PathBuf> {
    INDEX_FILES.iter().find_map(|name| {
        let candidate = dir.join(name);
        let path = candidate.to_fs_path(root);
        (candidate.exists_in(root) && path.is_file()).then_some(path)
    })
}

/// Fallback handler serving everything below the root.
pub(crate) async fn serve_resource(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
) -> Response {
    let uri_path = req.uri().path().to_owned();

    match respond(&state, &uri_path).await {
        Ok(response) => response,
        Err(err) => {
            let page = decode_path(&uri_path)
                .ok()
                .and_then(|decoded| state.engine.page(&decoded).ok());
            error_response(&state, &err, page.as_ref()).await
        }
    }
}

async fn respond(state: &AppState, uri_path: &str) -> Result<Response, ServerError> {
    let decoded = decode_path(uri_path)?;

    match locate(state.root(), &decoded)? {
        Resource::DirectoryRedirect => {
            let location = HeaderValue::try_from(format!("{uri_path}/"))
                .map_err(|_| ServerError::NotFound(uri_path.to_owned()))?;
            Ok((
                StatusCode::MOVED_PERMANENTLY,
                [(header::LOCATION, location)],
            )
                .into_response())
        }
        Resource::File { path, page } => serve_file(state, &path, &page).await,
        Resource::Listing { dir, page } => {
            let html = listing::render(&dir, &page).await?;
            Ok(html_response(state, StatusCode::OK, &html, &page))
        }
    }
}

async fn serve_file(
    state: &AppState,
    path: &Path,
    page: &CanonicalPath,
) -> Result<Response, ServerError> {
    let content = tokio::fs::read(path).await?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    if mime.essence_str() == "text/html" {
        let html = String::from_utf8_lossy(&content);
        return Ok(html_response(state, StatusCode::OK, &html, page));
    }

    let content_type = if mime.type_() == mime_guess::mime::TEXT
        || mime.essence_str() == "application/javascript"
    {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_owned()
    };
    Ok(([(header::CONTENT_TYPE, content_type)], content).into_response())
}

fn html_response(state: &AppState, status: StatusCode, html: &str, page: &CanonicalPath) -> Response {
    let body = if state.live_reload {
        state.engine.inject(html, page)
    } else {
        html.to_owned()
    };
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Render an error, preferring `<error_pages>/<status>.html`.
async fn error_response(
    state: &AppState,
    err: &ServerError,
    page: Option<&CanonicalPath>,
) -> Response {
    let status = err.status_code();
    let custom = state.error_pages.join(format!("{}.html", status.as_u16()));

    match tokio::fs::read_to_string(&custom).await {
        Ok(html) => {
            let root = CanonicalPath::root();
            html_response(state, status, &html, page.unwrap_or(&root))
        }
        Err(_) => {
            if let ServerError::Io(io) = err {
                tracing::warn!(error = %io, "Failed to read resource");
            }
            let body = format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Error")
            );
            (status, body).into_response()
        }
    }
}

/// Current markup of the resource at `raw`, as stored on disk.
///
/// Used to answer `fetch` frames. Missing resources yield `None`.
pub(crate) async fn load_markup(state: &AppState, raw: &str) -> Option<String> {
    let resource = match locate(state.root(), raw).ok()? {
        Resource::DirectoryRedirect => locate(state.root(), &format!("{raw}/")).ok()?,
        resource => resource,
    };

    match resource {
        Resource::File { path, .. } => tokio::fs::read_to_string(path).await.ok(),
        Resource::Listing { dir, page } => listing::render(&dir, &page).await.ok(),
        Resource::DirectoryRedirect => None,
    }
}
