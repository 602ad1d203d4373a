//! Glob patterns over canonical paths.
//!
//! `*` matches within a single segment, `**` matches any number of segments
//! including none. Leading and trailing slashes are ignored on both sides,
//! so `**/pages/blog/*` matches both `assets/pages/blog/post1` and
//! `/assets/pages/blog/post1/`.

use std::fmt;

use regex::Regex;

use crate::path::CanonicalPath;

/// Error returned for a pattern that does not compile.
#[derive(Debug, thiserror::Error)]
#[error("invalid path pattern {pattern:?}: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

#[derive(Clone, Debug)]
enum Matcher {
    Everything,
    Literal(String),
    Glob(Regex),
}

/// A compiled path pattern.
///
/// Used both for ignore rules and for pending reload targets.
#[derive(Clone, Debug)]
pub struct PathPattern {
    source: String,
    matcher: Matcher,
}

impl PathPattern {
    /// Compile a glob pattern.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let trimmed = pattern.trim_matches('/');
        let matcher = if trimmed == "**" {
            Matcher::Everything
        } else if !trimmed.contains(['*', '?']) {
            Matcher::Literal(trimmed.to_owned())
        } else {
            let regex = Regex::new(&glob_to_regex(trimmed)).map_err(|source| PatternError {
                pattern: pattern.to_owned(),
                source,
            })?;
            Matcher::Glob(regex)
        };
        Ok(Self {
            source: pattern.to_owned(),
            matcher,
        })
    }

    /// Pattern matching exactly one canonical path.
    #[must_use]
    pub fn literal(path: &CanonicalPath) -> Self {
        Self {
            source: path.as_str().to_owned(),
            matcher: Matcher::Literal(path.as_str().trim_matches('/').to_owned()),
        }
    }

    /// Pattern matching every path, `**`.
    #[must_use]
    pub fn everything() -> Self {
        Self {
            source: "**".to_owned(),
            matcher: Matcher::Everything,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_everything(&self) -> bool {
        matches!(self.matcher, Matcher::Everything)
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.trim_matches('/');
        match &self.matcher {
            Matcher::Everything => true,
            Matcher::Literal(literal) => literal == path,
            Matcher::Glob(regex) => regex.is_match(path),
        }
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PathPattern {}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Translate a slash-trimmed glob into an anchored regular expression.
fn glob_to_regex(glob: &str) -> String {
    let segments: Vec<&str> = glob.split('/').collect();
    let last = segments.len() - 1;
    let mut regex = String::from("^");
    let mut after_double_star = false;

    for (index, segment) in segments.iter().enumerate() {
        if *segment == "**" {
            regex.push_str(match (index == 0, index == last) {
                (true, true) => ".*",
                (true, false) => "(?:.*/)?",
                (false, true) => "(?:/.*)?",
                (false, false) => "/(?:.*/)?",
            });
            after_double_star = true;
            continue;
        }

        if index > 0 && !after_double_star {
            regex.push('/');
        }
        after_double_star = false;

        for ch in segment.chars() {
            match ch {
                '*' => regex.push_str("[^/]*"),
                '?' => regex.push_str("[^/]"),
                other => regex.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
    }

    regex.push('$');
    regex
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("*.css"), r"^[^/]*\.css$");
        assert_eq!(glob_to_regex("**/pages/blog/*"), r"^(?:.*/)?pages/blog/[^/]*$");
        assert_eq!(glob_to_regex("a/**/b"), r"^a/(?:.*/)?b$");
        assert_eq!(glob_to_regex("node_modules/**"), r"^node_modules(?:/.*)?$");
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let pattern = PathPattern::new("**/pages/blog/*").unwrap();

        assert!(pattern.matches("assets/pages/blog/post1"));
        assert!(pattern.matches("/assets/pages/blog/post1/"));
        assert!(pattern.matches("pages/blog/post1"));
        assert!(!pattern.matches("assets/pages/blog/sub/post1"));
        assert!(!pattern.matches("assets/pages/news/post1"));
    }

    #[test]
    fn test_double_star_matches_everything() {
        let pattern = PathPattern::new("**").unwrap();

        assert!(pattern.is_everything());
        assert!(pattern.matches("/"));
        assert!(pattern.matches("/blog/"));
        assert!(pattern.matches("a/b/c/d.html"));
    }

    #[test]
    fn test_double_star_matches_zero_segments() {
        let middle = PathPattern::new("docs/**/index.html").unwrap();
        assert!(middle.matches("docs/index.html"));
        assert!(middle.matches("docs/a/b/index.html"));

        let trailing = PathPattern::new(".git/**").unwrap();
        assert!(trailing.matches(".git"));
        assert!(trailing.matches(".git/objects/ab/cdef"));
        assert!(!trailing.matches(".github/workflows"));
    }

    #[test]
    fn test_literal_is_anchored() {
        let pattern = PathPattern::new("/blog/").unwrap();

        assert!(pattern.matches("/blog/"));
        assert!(pattern.matches("blog"));
        assert!(!pattern.matches("/blog/drafts/"));
        assert!(!pattern.matches("/weblog/"));
    }

    #[test]
    fn test_metacharacters_are_escaped() {
        let pattern = PathPattern::new("*.min.js").unwrap();

        assert!(pattern.matches("app.min.js"));
        assert!(!pattern.matches("app-minxjs"));
        assert!(PathPattern::new("(draft)/*").unwrap().matches("(draft)/a"));
    }

    #[test]
    fn test_question_mark_matches_one_character() {
        let pattern = PathPattern::new("post?.html").unwrap();

        assert!(pattern.matches("post1.html"));
        assert!(!pattern.matches("post10.html"));
    }

    #[test]
    fn test_equality_by_source() {
        assert_eq!(PathPattern::new("**").unwrap(), PathPattern::everything());
        assert_ne!(
            PathPattern::new("/blog/").unwrap(),
            PathPattern::new("/news/").unwrap()
        );
        assert_eq!(PathPattern::everything().to_string(), "**");
    }
}
