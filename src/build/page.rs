use std::path::{Path, PathBuf};

use serde::Serialize;

use super::front_matter::{Fields, parse_front_matter};
use crate::util::{dir_path, titleize};

#[derive(thiserror::Error, Debug)]
pub enum PageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One compiled unit of content.
///
/// The body is not stored; [`Page::read_body`] re-reads it from the source so
/// a render always sees the file as it is on disk.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    /// URL path of the containing directory, slash-terminated.
    pub path: String,
    /// Output file name (`intro.html`, `feed.xml`).
    pub filename: String,
    /// `path` + `filename`.
    pub link: String,
    pub title: String,
    pub layout: String,
    pub order: Option<f64>,
    pub notoc: bool,
    pub hide_title: bool,
    pub render_markdown: bool,
    /// Remaining front matter fields, visible in templates as `page.<name>`.
    #[serde(flatten)]
    pub extra: Fields,
}

impl Page {
    /// Load a page from a markdown source file.
    ///
    /// `dest_dir` is the output directory the page is written to and
    /// `web_path` the URL path of that directory.
    pub fn load(source_path: &Path, dest_dir: &Path, web_path: &str) -> Result<Self, PageError> {
        tracing::debug!(source = %source_path.display(), web_path, "loading page");
        let content = read_source(source_path)?;
        Ok(Self::from_source(&content, source_path, dest_dir, web_path))
    }

    /// Build a page from already-read source text.
    pub fn from_source(content: &str, source_path: &Path, dest_dir: &Path, web_path: &str) -> Self {
        let parsed = parse_front_matter(content);
        let mut extra = parsed.fields;

        let source_name = source_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let filename = output_file_name(&source_name);
        let path = dir_path(web_path);
        let link = format!("{path}{filename}");

        let mut hide_title = take_bool(&mut extra, "hideTitle").unwrap_or(false);
        let title = match extra.remove("title") {
            Some(serde_json::Value::String(title)) => title,
            Some(serde_json::Value::Null) | None => match heading_title(&parsed.body) {
                Some(title) => {
                    hide_title = true;
                    title
                }
                None => titleize(filename.strip_suffix(".html").unwrap_or(&filename)),
            },
            Some(other) => other.to_string(),
        };

        let layout = match extra.remove("layout") {
            Some(serde_json::Value::String(layout)) if !layout.is_empty() => layout,
            _ => "default".to_string(),
        };
        let order = extra.remove("order").and_then(|order| match order {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        let notoc = take_bool(&mut extra, "notoc").unwrap_or(false);
        let render_markdown = take_bool(&mut extra, "renderMarkdown").unwrap_or(true);

        Self {
            source_path: source_path.to_path_buf(),
            dest_path: dest_dir.join(&filename),
            path,
            filename,
            link,
            title,
            layout,
            order,
            notoc,
            hide_title,
            render_markdown,
            extra,
        }
    }

    /// Read the markdown body (without front matter) from the source file.
    pub fn read_body(&self) -> Result<String, PageError> {
        let content = read_source(&self.source_path)?;
        Ok(parse_front_matter(&content).body)
    }

    /// Index pages supply their directory's title.
    pub fn is_index(&self) -> bool {
        self.filename.starts_with("index.")
    }

    /// Whether any of the given front matter flags is set to `true`.
    pub fn has_flag(&self, flags: &[String]) -> bool {
        flags
            .iter()
            .any(|flag| self.extra.get(flag).and_then(|v| v.as_bool()).unwrap_or(false))
    }
}

fn read_source(path: &Path) -> Result<String, PageError> {
    std::fs::read_to_string(path).map_err(|source| PageError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn take_bool(fields: &mut Fields, key: &str) -> Option<bool> {
    fields.remove(key).and_then(|value| value.as_bool())
}

/// Title from a `#` heading on the body's first line.
fn heading_title(body: &str) -> Option<String> {
    let first = body.lines().next()?.trim();
    if !first.starts_with('#') {
        return None;
    }
    let title = first.trim_start_matches('#').trim_end_matches(['#', ' ']).trim();
    Some(title.to_string())
}

/// Output file name for a markdown source.
/// "intro.md" -> "intro.html", "feed.xml.md" -> "feed.xml"
pub fn output_file_name(source_name: &str) -> String {
    let stem = source_name.strip_suffix(".md").unwrap_or(source_name);
    if stem.contains('.') {
        stem.to_string()
    } else {
        format!("{stem}.html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(content: &str, name: &str, web_path: &str) -> Page {
        Page::from_source(
            content,
            &PathBuf::from("content").join(name),
            Path::new("build/docs"),
            web_path,
        )
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("intro.md"), "intro.html");
        assert_eq!(output_file_name("feed.xml.md"), "feed.xml");
        assert_eq!(output_file_name("index.md"), "index.html");
    }

    #[test]
    fn test_computed_paths() {
        let page = page("Body", "getting-started.md", "docs");
        assert_eq!(page.filename, "getting-started.html");
        assert_eq!(page.path, "/docs/");
        assert_eq!(page.link, "/docs/getting-started.html");
        assert_eq!(page.dest_path, PathBuf::from("build/docs/getting-started.html"));
        assert_eq!(page.layout, "default");
        assert!(page.render_markdown);
    }

    #[test]
    fn test_title_from_front_matter() {
        let page = page("---\ntitle: Welcome\n---\n# Heading", "intro.md", "/");
        assert_eq!(page.title, "Welcome");
        assert!(!page.hide_title);
    }

    #[test]
    fn test_title_from_first_heading() {
        let page = page("## Setting Up\n\ntext", "setup.md", "/");
        assert_eq!(page.title, "Setting Up");
        assert!(page.hide_title);
    }

    #[test]
    fn test_title_from_filename() {
        let page = page("text", "how-to-install_an-app.md", "/");
        assert_eq!(page.title, "How to Install an App");
        assert!(!page.hide_title);
    }

    #[test]
    fn test_recognized_fields_are_consumed() {
        let page = page(
            "---\nlayout: api\norder: 3\nnotoc: true\nrenderMarkdown: false\nauthor: Jo\n---\nx",
            "a.md",
            "/",
        );
        assert_eq!(page.layout, "api");
        assert_eq!(page.order, Some(3.0));
        assert!(page.notoc);
        assert!(!page.render_markdown);
        assert_eq!(page.extra.len(), 1);
        assert_eq!(page.extra["author"], "Jo");
    }

    #[test]
    fn test_ignore_flags() {
        let page = page("---\ndraft: true\n---\nx", "a.md", "/");
        assert!(page.has_flag(&["draft".to_string()]));
        assert!(!page.has_flag(&["hidden".to_string()]));
    }

    #[test]
    fn test_read_body_rereads_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("page.md");
        std::fs::write(&source, "---\ntitle: T\n---\nfirst").unwrap();

        let page = Page::load(&source, dir.path(), "/").unwrap();
        assert_eq!(page.read_body().unwrap(), "first");

        std::fs::write(&source, "---\ntitle: T\n---\nsecond").unwrap();
        assert_eq!(page.read_body().unwrap(), "second");
    }

    #[test]
    fn test_serialized_fields() {
        let page = page("---\nauthor: Jo\n---\nx", "a.md", "/");
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["link"], "/a.html");
        assert_eq!(value["hide_title"], false);
        assert_eq!(value["author"], "Jo");
    }
}
