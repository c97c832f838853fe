//! Output link rewriting and layout selection.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::page::Page;

/// The `href`/`src` of an `<a>`, `<img>`, `<script>` or `<link>` tag whose
/// value is an absolute path. Group 1 is everything up to the opening quote,
/// group 2 the path onward.
static ABSOLUTE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<\s*(?:a|img|script|link)\s+[^>]*?(?:href|src)\s*=\s*['"])(/[^'"]*['"][^>]*>)"#)
        .unwrap()
});

/// Rewrites URLs in rendered pages.
#[derive(Debug, Clone, Default)]
pub struct LinkRewriter {
    /// Normalized sub-path (`/docs`).
    sub_path: Option<String>,
    cdn: Option<CdnRewrite>,
}

/// Replace URLs matching `pattern` so they point at `uri`.
///
/// The pattern's first three groups are kept around the origin:
/// a match becomes `$1 + uri + $2 + $3`.
#[derive(Debug, Clone)]
pub struct CdnRewrite {
    pub pattern: Regex,
    pub uri: String,
}

impl LinkRewriter {
    pub fn new(sub_path: Option<String>, cdn: Option<CdnRewrite>) -> Self {
        let cdn = cdn.filter(|cdn| !cdn.uri.is_empty());
        Self { sub_path, cdn }
    }

    pub fn rewrite(&self, html: &str) -> String {
        let mut output = match &self.sub_path {
            Some(sub_path) => prefix_sub_path(html, sub_path),
            None => html.to_string(),
        };
        if let Some(cdn) = &self.cdn {
            output = cdn
                .pattern
                .replace_all(&output, |caps: &Captures| {
                    let group = |i| caps.get(i).map_or("", |m| m.as_str());
                    format!("{}{}{}{}", group(1), cdn.uri, group(2), group(3))
                })
                .into_owned();
        }
        output
    }
}

/// Prefix absolute link targets with the deployment sub-path.
///
/// Protocol-relative URLs (`//host/...`) and paths already under the
/// sub-path are left alone.
pub fn prefix_sub_path(html: &str, sub_path: &str) -> String {
    ABSOLUTE_LINK
        .replace_all(html, |caps: &Captures| {
            let target = &caps[2];
            if target.starts_with("//") || is_under(target, sub_path) {
                caps[0].to_string()
            } else {
                format!("{}{sub_path}{target}", &caps[1])
            }
        })
        .into_owned()
}

/// Whether `target` already starts with `sub_path`, ignoring case.
fn is_under(target: &str, sub_path: &str) -> bool {
    let len = sub_path.len();
    target.len() >= len && target.is_char_boundary(len) && target[..len].eq_ignore_ascii_case(sub_path)
}

/// A path-based default layout.
#[derive(Debug, Clone)]
pub struct LayoutRule {
    /// Case-insensitive link prefix.
    pub web_path: Option<String>,
    /// Case-insensitive link pattern.
    pub web_path_regex: Option<Regex>,
    pub template: String,
}

impl LayoutRule {
    fn matches(&self, link: &str) -> bool {
        let by_prefix = self.web_path.as_ref().is_some_and(|prefix| {
            link.len() >= prefix.len()
                && link.is_char_boundary(prefix.len())
                && link[..prefix.len()].eq_ignore_ascii_case(prefix)
        });
        by_prefix || self.web_path_regex.as_ref().is_some_and(|re| re.is_match(link))
    }
}

pub const DEFAULT_LAYOUT: &str = "default";

/// Pick the layout for a page.
///
/// 1. the page's own `layout`, if it exists and is not `default`
/// 2. the first rule matching the page's link whose layout exists
/// 3. `default`
pub fn select_layout<'a>(
    page: &'a Page,
    rules: &'a [LayoutRule],
    has_layout: impl Fn(&str) -> bool,
) -> &'a str {
    if page.layout != DEFAULT_LAYOUT && has_layout(&page.layout) {
        return &page.layout;
    }

    if let Some(rule) = rules
        .iter()
        .find(|rule| rule.matches(&page.link) && has_layout(&rule.template))
    {
        return &rule.template;
    }

    if page.layout != DEFAULT_LAYOUT {
        tracing::warn!(page = %page.link, layout = %page.layout, "unknown layout, using default");
    }
    DEFAULT_LAYOUT
}
