//! pulldown-cmark as the host renderer.
//!
//! Runs of unclaimed lines and single-line inline content (table cells,
//! heading text) both go through here so links are classified the same way
//! everywhere.

use std::collections::HashMap;

use html_escape::encode_double_quoted_attribute;
use pulldown_cmark::{BrokenLink, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use regex::Regex;

/// Link reference definitions of a whole document.
///
/// Every host call only sees its own run of lines, so `[text][label]` in one
/// run is resolved against definitions found anywhere in the document.
#[derive(Debug, Clone, Default)]
pub struct LinkRefs {
    defs: HashMap<String, (String, String)>,
}

impl LinkRefs {
    /// Collect the definitions pulldown-cmark finds in `markdown`.
    pub fn scan(markdown: &str, options: Options) -> Self {
        let parser = Parser::new_ext(markdown, options);
        let defs = parser
            .reference_definitions()
            .iter()
            .map(|(label, def)| {
                let title = def.title.as_deref().unwrap_or("").to_string();
                (normalize_label(label), (def.dest.to_string(), title))
            })
            .collect();
        Self { defs }
    }

    fn resolve(&self, label: &str) -> Option<(String, String)> {
        self.defs.get(&normalize_label(label)).cloned()
    }
}

/// Labels match case-insensitively with inner whitespace collapsed.
fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Decides whether a link target stays in the current tab.
pub(super) struct LinkClassifier {
    internal: Option<Regex>,
}

impl LinkClassifier {
    pub(super) fn new(internal: Option<Regex>) -> Self {
        Self { internal }
    }

    fn is_internal(&self, href: &str) -> bool {
        self.internal.as_ref().is_some_and(|re| re.is_match(href))
    }

    fn rewrite<'a>(&self, event: Event<'a>) -> Event<'a> {
        match event {
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) => {
                let mut tag = format!("<a href=\"{}\"", encode_double_quoted_attribute(&dest_url));
                if !title.is_empty() {
                    tag.push_str(&format!(
                        " title=\"{}\"",
                        encode_double_quoted_attribute(&title)
                    ));
                }
                if !self.is_internal(&dest_url) {
                    tag.push_str(" target=\"_blank\"");
                }
                tag.push('>');
                Event::InlineHtml(CowStr::from(tag))
            }
            Event::End(TagEnd::Link) => Event::InlineHtml(CowStr::Borrowed("</a>")),
            other => other,
        }
    }
}

pub(super) fn render_host(
    source: &str,
    options: Options,
    links: &LinkClassifier,
    refs: &LinkRefs,
) -> String {
    let resolve = |link: BrokenLink| {
        refs.resolve(&link.reference)
            .map(|(dest, title)| (dest.into(), title.into()))
    };
    let parser = Parser::new_with_broken_link_callback(source, options, Some(resolve))
        .map(|event| links.rewrite(event));
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}

pub(super) fn render_inline(
    text: &str,
    options: Options,
    links: &LinkClassifier,
    refs: &LinkRefs,
) -> String {
    let source = protect_block_start(text.trim());
    let resolve = |link: BrokenLink| {
        refs.resolve(&link.reference)
            .map(|(dest, title)| (dest.into(), title.into()))
    };
    let parser = Parser::new_with_broken_link_callback(&source, options, Some(resolve))
        .filter(|event| {
            !matches!(
                event,
                Event::Start(Tag::Paragraph) | Event::End(TagEnd::Paragraph)
            )
        })
        .map(|event| links.rewrite(event));
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output.trim_end_matches('\n').to_string()
}

/// Escape a leading character that would make pulldown-cmark open a block
/// (list, quote, heading, fence, thematic break) instead of a paragraph.
fn protect_block_start(text: &str) -> String {
    let Some(first) = text.chars().next() else {
        return String::new();
    };
    let rest = &text[first.len_utf8()..];

    let escape_first = match first {
        '>' | '#' => true,
        '-' | '+' | '*' => {
            rest.is_empty() || rest.starts_with([' ', '\t']) || is_thematic_break(text)
        }
        '_' => is_thematic_break(text),
        '`' | '~' => rest.starts_with(&first.to_string().repeat(2)),
        '0'..='9' => {
            let digits = text.bytes().take_while(u8::is_ascii_digit).count();
            let after = &text[digits..];
            if digits <= 9 && (after.starts_with(". ") || after.starts_with(") ") || after == "." || after == ")") {
                // "1. item" -> "1\. item"
                return format!("{}\\{}", &text[..digits], after);
            }
            false
        }
        _ => false,
    };

    if escape_first {
        format!("\\{text}")
    } else {
        text.to_string()
    }
}

fn is_thematic_break(text: &str) -> bool {
    let Some(marker) = text.chars().find(|c| !c.is_whitespace()) else {
        return false;
    };
    matches!(marker, '-' | '*' | '_')
        && text.chars().all(|c| c == marker || c == ' ' || c == '\t')
        && text.chars().filter(|&c| c == marker).count() >= 3
}
