use html_escape::encode_double_quoted_attribute;

use super::state::{BlockState, indent_width, marker_run};
use super::{Block, BlockRule, LinkRefs, MarkdownError, MarkdownRenderer};

/// ATX headings. The space after the `#` run is optional.
pub struct HeadingRule;

impl BlockRule for HeadingRule {
    fn name(&self) -> &'static str {
        "heading"
    }

    fn parse(
        &self,
        state: &mut BlockState<'_>,
        _md: &MarkdownRenderer,
    ) -> Result<Option<Block>, MarkdownError> {
        let line = state.current();
        if indent_width(line) > 3 {
            return Ok(None);
        }
        let Some((level, text)) = parse_heading(line.trim_start()) else {
            return Ok(None);
        };

        state.line += 1;
        Ok(Some(Block::Heading {
            level,
            text: text.to_string(),
        }))
    }
}

/// Split a heading line into its level and text, trimming any closing `#` run.
pub(super) fn parse_heading(text: &str) -> Option<(u8, &str)> {
    let level = marker_run(text, '#');
    if level == 0 || level > 6 {
        return None;
    }
    let content = text[level..]
        .trim_end_matches([' ', '\t', '#'])
        .trim_start_matches([' ', '\t']);
    Some((level as u8, content))
}

/// Fragment identifier for a heading: lower-cased, with every run of
/// characters outside `[a-z0-9]` collapsed to a single `_`.
pub fn anchor_name(text: &str) -> String {
    let mut anchor = String::with_capacity(text.len());
    let mut in_gap = false;
    for c in text.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            anchor.push(c);
            in_gap = false;
        } else if !in_gap {
            anchor.push('_');
            in_gap = true;
        }
    }
    anchor
}

pub(super) fn render(level: u8, text: &str, md: &MarkdownRenderer, refs: &LinkRefs) -> String {
    let anchor = encode_double_quoted_attribute(&anchor_name(text)).into_owned();
    format!(
        "<a href=\"#{anchor}\" name=\"{anchor}\" class=\"toc-link toc-link-h{level}\"><h{level}>{}<span class=\"oi toc-link-icon\" data-glyph=\"link-intact\"></span></h{level}></a>\n",
        md.render_inline(text, refs)
    )
}
