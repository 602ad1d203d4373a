//! Colored terminal output utilities.

use std::path::Path;

use console::{Style, Term};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    label: Style,
    url: Style,
    warn: Style,
    error: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            label: Style::new().dim(),
            url: Style::new().cyan().bold().underlined(),
            warn: Style::new().yellow(),
            error: Style::new().red(),
        }
    }

    /// Startup banner naming the served directory and its URL.
    pub(crate) fn serving(&self, root: &Path, url: &str) {
        let _ = self.term.write_line(&format!(
            "Serving {} at {}",
            root.display(),
            self.url.apply_to(url)
        ));
    }

    /// Indented `label: value` line under the banner.
    pub(crate) fn detail(&self, label: &str, value: impl std::fmt::Display) {
        let _ = self
            .term
            .write_line(&format!("  {} {value}", self.label.apply_to(format!("{label}:"))));
    }

    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.warn.apply_to(msg).to_string());
    }

    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.error.apply_to(msg).to_string());
    }
}
