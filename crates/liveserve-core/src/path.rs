//! Canonical URL paths for served resources.
//!
//! Raw paths arrive from two directions: absolute filesystem paths reported
//! by the watcher and URL paths requested by browsers. Both are reduced to a
//! [`CanonicalPath`], the root-relative directory URL of the page a resource
//! belongs to, so that a change and a page can be compared as plain strings.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::pattern::PathPattern;

/// File names served in place of a directory, in order of preference.
pub const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

/// Extensions whose changes reload every open page.
const SHARED_ASSET_EXTENSIONS: [&str; 2] = ["css", "js"];

/// Error returned when a path climbs above the served root.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("path escapes the served root: {raw}")]
pub struct PathEscapeError {
    /// The offending input, as received.
    pub raw: String,
}

/// Root-relative, forward-slash URL path of a page.
///
/// Always starts and ends with `/`; the site root is `/`. Values are only
/// produced by [`normalize`] and the transformations below, which return new
/// values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// The site root, `/`.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_owned())
    }

    fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        if segments.is_empty() {
            return Self::root();
        }
        let mut path = String::from("/");
        for segment in segments {
            path.push_str(segment.as_ref());
            path.push('/');
        }
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Parent directory. The root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        let segments: Vec<&str> = self.segments().collect();
        match segments.split_last() {
            Some((_, parent)) => Self::from_segments(parent),
            None => Self::root(),
        }
    }

    /// Whether `self` is `ancestor` or lies below it.
    pub fn starts_with(&self, ancestor: &Self) -> bool {
        self.0.starts_with(&ancestor.0)
    }

    /// Replace the `src` prefix with `dest`.
    ///
    /// Returns `None` when `self` is not `src` or one of its descendants.
    #[must_use]
    pub fn rebase(&self, src: &Self, dest: &Self) -> Option<Self> {
        let rest = self.0.strip_prefix(&src.0)?;
        Some(Self(format!("{}{rest}", dest.0)))
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lexically resolved location of a resource below the served root.
///
/// Unlike [`CanonicalPath`] this keeps the exact resource, file name
/// included. It is what the static responder reads from disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SitePath {
    segments: Vec<String>,
    directory: bool,
}

impl SitePath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether the raw input ended in a separator (or `.`/`..`).
    pub fn has_trailing_slash(&self) -> bool {
        self.directory
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn extension(&self) -> Option<&str> {
        self.file_name()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
    }

    /// Root-relative path without leading or trailing slash.
    pub fn relative(&self) -> String {
        self.segments.join("/")
    }

    /// Location of the resource on disk.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(&self.segments);
        path
    }

    /// Same location with `suffix` appended to the final segment.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> Option<Self> {
        let (last, parent) = self.segments.split_last()?;
        let mut segments = parent.to_vec();
        segments.push(format!("{last}{suffix}"));
        Some(Self {
            segments,
            directory: false,
        })
    }

    /// Same location with `name` appended as a child segment.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_owned());
        Self {
            segments,
            directory: false,
        }
    }

    /// Whether the resource exists with exactly this spelling.
    pub fn exists_in(&self, root: &Path) -> bool {
        exists_case_sensitive(root, &self.segments)
    }

    /// Whether this location names a file rather than a directory.
    ///
    /// A trailing slash always means a directory. Otherwise the disk decides,
    /// and a path that does not exist is taken to be a file when its last
    /// segment carries an extension (a just-deleted `page.html`).
    pub fn names_file(&self, root: &Path) -> bool {
        if self.directory || self.segments.is_empty() {
            return false;
        }
        match fs::metadata(self.to_fs_path(root)) {
            Ok(meta) if self.exists_in(root) => meta.is_file(),
            _ => self.extension().is_some(),
        }
    }

    /// Canonical path of the page this resource belongs to.
    ///
    /// Files map to their parent directory; `index.html` therefore maps to
    /// the directory it indexes.
    pub fn page(&self, root: &Path) -> CanonicalPath {
        if self.names_file(root) {
            CanonicalPath::from_segments(&self.segments[..self.segments.len() - 1])
        } else {
            CanonicalPath::from_segments(&self.segments)
        }
    }
}

/// Resolve `raw` against `root` without touching the filesystem.
///
/// Backslashes become forward slashes, a leading copy of `root` is stripped,
/// empty and `.` segments are dropped and `..` pops a segment.
pub fn resolve(root: &Path, raw: &str) -> Result<SitePath, PathEscapeError> {
    let slashed = raw.replace('\\', "/");
    let root = root.to_string_lossy().replace('\\', "/");
    let rest = strip_root(&slashed, root.trim_end_matches('/'));

    let mut segments: Vec<String> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathEscapeError {
                        raw: raw.to_owned(),
                    });
                }
            }
            other => segments.push(other.to_owned()),
        }
    }

    let directory = rest.ends_with('/') || rest.ends_with("/.") || rest.ends_with("/..");
    Ok(SitePath {
        segments,
        directory: directory || matches!(rest, "." | ".."),
    })
}

fn strip_root<'a>(raw: &'a str, root: &str) -> &'a str {
    if root.is_empty() || root == "." {
        return raw;
    }
    match raw.strip_prefix(root) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => raw,
    }
}

/// Whether a watcher-reported path lies under `root`.
///
/// Relative paths are taken as root-relative and checked later by
/// [`resolve`]. Absolute paths must share `root` as a component prefix.
pub fn is_within(root: &Path, path: &Path) -> bool {
    !path.is_absolute() || path.starts_with(root)
}

/// Normalize `raw` to the canonical path of the page it belongs to.
///
/// `""`, `"/"` and `root` itself all yield `/`. A file yields its parent
/// directory. The result is a fixed point: normalizing it again returns it
/// unchanged.
pub fn normalize(root: &Path, raw: &str) -> Result<CanonicalPath, PathEscapeError> {
    Ok(resolve(root, raw)?.page(root))
}

/// Check existence segment by segment, comparing names byte for byte.
///
/// Case-insensitive filesystems would otherwise serve `/About/` for
/// `/about/`, which then fails on the deployment target.
pub fn exists_case_sensitive<S: AsRef<str>>(root: &Path, segments: &[S]) -> bool {
    let mut current = root.to_path_buf();
    for segment in segments {
        let segment = segment.as_ref();
        let Ok(entries) = fs::read_dir(&current) else {
            return false;
        };
        let found = entries
            .filter_map(Result::ok)
            .any(|entry| entry.file_name().to_str() == Some(segment));
        if !found {
            return false;
        }
        current.push(segment);
    }
    current.exists()
}

/// Patterns of the pages to reload when `raw` changes.
///
/// Always the page containing the resource; stylesheets and scripts add `**`
/// since any page may include them.
pub fn reload_targets(root: &Path, raw: &str) -> Result<Vec<PathPattern>, PathEscapeError> {
    let site_path = resolve(root, raw)?;
    let mut targets = vec![PathPattern::literal(&site_path.page(root))];

    let shared_asset = site_path.extension().is_some_and(|ext| {
        SHARED_ASSET_EXTENSIONS
            .iter()
            .any(|candidate| ext.eq_ignore_ascii_case(candidate))
    });
    if shared_asset {
        targets.push(PathPattern::everything());
    }
    Ok(targets)
}
