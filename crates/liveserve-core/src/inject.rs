//! Bootstrap snippet injection into served HTML.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::path::CanonicalPath;

const POLL_SCRIPT: &str = include_str!("../assets/poll.js");
const SOCKET_SCRIPT: &str = include_str!("../assets/socket.js");
const PATH_PLACEHOLDER: &str = "__LIVE_RELOAD_PATH__";

static HEAD_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static HTML_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<html(?:\s[^>]*)?>").unwrap());

/// Transport used to signal reloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    /// Pages poll `/livereload/{path}` and reload on `1`.
    Poll,
    /// Pages hold a WebSocket and swap in fresh markup on `update`.
    #[default]
    Socket,
}

impl fmt::Display for ReloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poll => "poll",
            Self::Socket => "socket",
        })
    }
}

/// Error for an unrecognized [`ReloadMode`] name.
#[derive(Debug, thiserror::Error)]
#[error("unknown reload mode {0:?}, expected \"poll\" or \"socket\"")]
pub struct UnknownModeError(String);

impl FromStr for ReloadMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poll" => Ok(Self::Poll),
            "socket" => Ok(Self::Socket),
            _ => Err(UnknownModeError(s.to_owned())),
        }
    }
}

/// Bootstrap markup for a page with canonical path `page`.
pub fn snippet(mode: ReloadMode, page: &CanonicalPath) -> String {
    match mode {
        ReloadMode::Poll => {
            let script = POLL_SCRIPT.replace(PATH_PLACEHOLDER, &script_literal(page.as_str()));
            format!("<script>\n{script}</script>\n")
        }
        ReloadMode::Socket => format!(
            "<meta name=\"_LIVE_RELOAD_PATH_\" content=\"{}\">\n<script>\n{SOCKET_SCRIPT}</script>\n",
            attribute_value(page.as_str())
        ),
    }
}

/// Insert the bootstrap for `mode` into `html`.
///
/// The polling snippet is appended to the document. The socket snippet goes
/// before `</head>`; without one, it is wrapped in a `<head>` placed right
/// after the opening `<html>` tag, and as a last resort appended.
pub fn inject(html: &str, mode: ReloadMode, page: &CanonicalPath) -> String {
    let snippet = snippet(mode, page);
    if mode == ReloadMode::Poll {
        return format!("{html}{snippet}");
    }

    if let Some(head_close) = HEAD_CLOSE_RE.find(html) {
        let at = head_close.start();
        return format!("{}{snippet}{}", &html[..at], &html[at..]);
    }
    if let Some(html_open) = HTML_OPEN_RE.find(html) {
        let at = html_open.end();
        return format!("{}<head>{snippet}</head>{}", &html[..at], &html[at..]);
    }
    format!("{html}{snippet}")
}

/// JSON string literal safe to embed inside `<script>`.
fn script_literal(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace("</", "<\\/")
}

fn attribute_value(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn page(raw: &str) -> CanonicalPath {
        crate::path::normalize(Path::new("/srv/site"), raw).unwrap()
    }

    #[test]
    fn test_socket_snippet_goes_before_head_close() {
        let html = "<html><head><title>t</title></head><body></body></html>";
        let out = inject(html, ReloadMode::Socket, &page("/blog/"));

        let meta = out.find("_LIVE_RELOAD_PATH_").unwrap();
        let head_close = out.find("</head>").unwrap();
        assert!(meta < head_close);
        assert!(out.contains("content=\"/blog/\""));
        assert!(out.ends_with("<body></body></html>"));
    }

    #[test]
    fn test_head_close_is_case_insensitive() {
        let html = "<HTML><HEAD></HEAD><BODY></BODY></HTML>";
        let out = inject(html, ReloadMode::Socket, &page("/"));

        assert!(out.find("<script>").unwrap() < out.find("</HEAD>").unwrap());
    }

    #[test]
    fn test_head_is_synthesized_after_html_tag() {
        let html = "<html lang=\"en\"><body>hi</body></html>";
        let out = inject(html, ReloadMode::Socket, &page("/"));

        assert!(out.starts_with("<html lang=\"en\"><head><meta name=\"_LIVE_RELOAD_PATH_\""));
        assert!(out.contains("</script>\n</head><body>hi</body></html>"));
    }

    #[test]
    fn test_fragment_gets_snippet_appended() {
        let out = inject("<p>fragment</p>", ReloadMode::Socket, &page("/"));

        assert!(out.starts_with("<p>fragment</p><meta"));
    }

    #[test]
    fn test_poll_snippet_is_appended_with_path() {
        let html = "<html><head></head><body></body></html>";
        let out = inject(html, ReloadMode::Poll, &page("/blog/"));

        assert!(out.starts_with(html));
        assert!(out.contains("var PAGE = \"/blog/\";"));
        assert!(!out.contains(PATH_PLACEHOLDER));
    }

    #[test]
    fn test_scripts_use_the_served_endpoints() {
        assert!(POLL_SCRIPT.contains(&format!("\"{}\"", crate::POLL_ENDPOINT)));
        assert!(SOCKET_SCRIPT.contains(crate::SOCKET_ENDPOINT));
    }

    #[test]
    fn test_embedded_values_are_escaped() {
        assert_eq!(script_literal("/a</script>/"), "\"/a<\\/script>/\"");
        assert_eq!(attribute_value("/\"x\"&/"), "/&quot;x&quot;&amp;/");
    }

    #[test]
    fn test_reload_mode_names() {
        assert_eq!("poll".parse::<ReloadMode>().unwrap(), ReloadMode::Poll);
        assert_eq!("Socket".parse::<ReloadMode>().unwrap(), ReloadMode::Socket);
        assert!("sse".parse::<ReloadMode>().is_err());
        assert_eq!(ReloadMode::default().to_string(), "socket");
    }
}
