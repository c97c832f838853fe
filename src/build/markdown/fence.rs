//! Fenced code blocks with JSON attributes.
//!
//! ````text
//! ```{"title": "Example", "language": "js", "autoCollapse": true}
//! #!js
//! console.log("hi");
//! ```
//! ````

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Deserialize;

use super::state::{BlockState, indent_width, marker_run};
use super::{Block, BlockRule, MarkdownError, MarkdownRenderer};

/// Attributes accepted on a fence opener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FenceAttributes {
    pub title: Option<String>,
    pub language: Option<String>,
    pub max_height: Option<MaxHeight>,
    pub auto_collapse: bool,
    pub show_line_numbers: bool,
    pub tabs_to_spaces: Option<usize>,
}

/// `maxHeight` may be given as a CSS length or a bare pixel count.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MaxHeight {
    Pixels(u64),
    Css(String),
}

impl MaxHeight {
    fn css(&self) -> String {
        match self {
            MaxHeight::Pixels(px) => format!("{px}px"),
            MaxHeight::Css(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeFence {
    pub attrs: FenceAttributes,
    pub content: String,
}

impl CodeFence {
    pub fn to_html(&self) -> String {
        let attrs = &self.attrs;

        let content = match attrs.tabs_to_spaces {
            Some(width) => self.content.replace('\t', &" ".repeat(width)),
            None => self.content.clone(),
        };
        let escaped = encode_text(&content);
        let code = if attrs.show_line_numbers {
            escaped
                .split('\n')
                .enumerate()
                .map(|(i, line)| format!("<span class=\"line-number\">{}</span>{line}", i + 1))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            escaped.into_owned()
        };

        let mut html = String::from("<div class=\"card fence\">\n");
        if let Some(title) = &attrs.title {
            html.push_str(&format!(
                "<h5 class=\"card-header fence-header\">{}</h5>\n",
                encode_text(title)
            ));
        }

        html.push_str("<div class=\"card-body fence-body\"");
        if attrs.auto_collapse {
            html.push_str(" style=\"display: none\"");
        }
        html.push_str(">\n<pre");
        if attrs.show_line_numbers {
            html.push_str(" class=\"line-numbers\"");
        }
        if let Some(max_height) = &attrs.max_height {
            html.push_str(&format!(
                " style=\"max-height: {}; overflow: auto\"",
                encode_double_quoted_attribute(&max_height.css())
            ));
        }
        html.push_str("><code");
        if let Some(language) = &attrs.language {
            html.push_str(&format!(
                " class=\"lang-{}\"",
                encode_double_quoted_attribute(language)
            ));
        }
        html.push('>');
        html.push_str(&code);
        html.push_str("</code></pre>\n</div>\n</div>\n");
        html
    }
}

pub struct FenceRule;

impl BlockRule for FenceRule {
    fn name(&self) -> &'static str {
        "fence"
    }

    fn parse(
        &self,
        state: &mut BlockState<'_>,
        _md: &MarkdownRenderer,
    ) -> Result<Option<Block>, MarkdownError> {
        let line = state.current();
        let indent = indent_width(line);
        if indent > 3 {
            return Ok(None);
        }
        let text = line.trim_start();
        let Some(marker) = text.chars().next().filter(|c| matches!(c, '`' | '~')) else {
            return Ok(None);
        };
        let run = marker_run(text, marker);
        if run < 3 {
            return Ok(None);
        }
        let opener = &text[..run];
        let rest = &text[run..];

        // ``` content ``` on a single line
        if let Some(inner) = rest.trim_end().strip_suffix(opener) {
            let content = inner.trim();
            if !content.is_empty() && !content.ends_with(marker) {
                state.line += 1;
                return Ok(Some(Block::Fence(CodeFence {
                    attrs: FenceAttributes::default(),
                    content: unescape(content, opener),
                })));
            }
        }

        let info = rest.trim();
        let mut attrs = if info.starts_with('{') {
            serde_json::from_str::<FenceAttributes>(info).map_err(|source| {
                MarkdownError::FenceAttributes {
                    line: state.line + 1,
                    source,
                }
            })?
        } else {
            FenceAttributes {
                language: (!info.is_empty()).then(|| info.to_string()),
                ..FenceAttributes::default()
            }
        };

        let mut next = state.line + 1;
        if next < state.end
            && let Some(language) = state.line_at(next).trim().strip_prefix("#!")
        {
            let language = language.trim();
            if !language.is_empty() {
                attrs.language = Some(language.to_string());
            }
            next += 1;
        }

        let mut content: Vec<String> = Vec::new();
        let mut closed = false;
        while next < state.end {
            let body_line = state.line_at(next);
            if is_closing(body_line, marker, run) {
                closed = true;
                break;
            }
            if !(content.is_empty() && body_line.trim().is_empty()) {
                content.push(unescape(strip_indent(body_line, indent), opener));
            }
            next += 1;
        }

        state.line = if closed { next + 1 } else { next };
        Ok(Some(Block::Fence(CodeFence {
            attrs,
            content: content.join("\n"),
        })))
    }
}

fn is_closing(line: &str, marker: char, min_run: usize) -> bool {
    if indent_width(line) > 3 {
        return false;
    }
    let text = line.trim_start();
    let run = marker_run(text, marker);
    run >= min_run && text[run..].trim().is_empty()
}

/// Remove up to `width` columns of leading spaces, matching the opener's indentation.
fn strip_indent(line: &str, width: usize) -> &str {
    let spaces = line.bytes().take(width).take_while(|&b| b == b' ').count();
    &line[spaces..]
}

fn unescape(line: &str, opener: &str) -> String {
    line.replace(&format!("\\{opener}"), opener)
}
