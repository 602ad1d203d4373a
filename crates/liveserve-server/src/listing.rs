//! HTML directory listings.

use std::fmt::Write as _;
use std::path::Path;

use liveserve_core::CanonicalPath;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped in listing hrefs.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

struct Entry {
    name: String,
    is_dir: bool,
}

/// Render the listing of `dir`, served at `page`.
///
/// Entries are sorted case-insensitively, directories marked with a
/// trailing slash.
pub(crate) async fn render(dir: &Path, page: &CanonicalPath) -> std::io::Result<String> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let is_dir = entry.file_type().await.is_ok_and(|kind| kind.is_dir());
        entries.push(Entry { name, is_dir });
    }
    entries.sort_by_cached_key(|entry| entry.name.to_lowercase());

    let title = escape_html(page.as_str());
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Index of {title}</title>\n</head>\n<body>\n<h1>Index of {title}</h1>\n<ul>\n"
    );
    if !page.is_root() {
        html.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for entry in &entries {
        let slash = if entry.is_dir { "/" } else { "" };
        let _ = writeln!(
            html,
            "<li><a href=\"{}{slash}\">{}{slash}</a></li>",
            escape_html(&utf8_percent_encode(&entry.name, HREF).to_string()),
            escape_html(&entry.name),
        );
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    Ok(html)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_render_sorts_and_marks_directories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("A.txt"), "").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();

        let page = liveserve_core::normalize(dir.path(), "/files/").unwrap();
        let html = render(dir.path(), &page).await.unwrap();

        let a = html.find(">A.txt<").unwrap();
        let b = html.find(">b.txt<").unwrap();
        let docs = html.find(">docs/<").unwrap();
        assert!(a < b && b < docs);
        assert!(html.contains("<title>Index of /files/</title>"));
        assert!(html.contains("href=\"../\""));
    }

    #[tokio::test]
    async fn test_render_escapes_names() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a <b> & c.html"), "").unwrap();

        let html = render(dir.path(), &CanonicalPath::root()).await.unwrap();

        assert!(html.contains("href=\"a%20%3Cb%3E%20&amp;%20c.html\""));
        assert!(html.contains(">a &lt;b&gt; &amp; c.html<"));
        assert!(!html.contains("href=\"../\""));
    }
}
