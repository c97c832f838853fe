use html_escape::encode_double_quoted_attribute;

use super::heading::{anchor_name, parse_heading};
use super::state::BlockState;
use super::{Block, BlockRule, LinkRefs, MarkdownError, MarkdownRenderer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocItem {
    pub level: u8,
    pub text: String,
}

/// `[toc]` or `:::toc:::` on a line of its own.
///
/// Collects every heading from the following lines up to the end of the
/// enclosing block, skipping fenced code.
pub struct TocRule;

impl BlockRule for TocRule {
    fn name(&self) -> &'static str {
        "toc"
    }

    fn parse(
        &self,
        state: &mut BlockState<'_>,
        _md: &MarkdownRenderer,
    ) -> Result<Option<Block>, MarkdownError> {
        if !is_toc_marker(state.current()) {
            return Ok(None);
        }

        let mut items = Vec::new();
        let mut in_fence = false;
        for line in state.remaining_from(state.line + 1) {
            if line.starts_with("```") || line.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if let Some((level, text)) = parse_heading(line)
                && !text.is_empty()
            {
                items.push(TocItem {
                    level,
                    text: text.to_string(),
                });
            }
        }

        state.line += 1;
        Ok(Some(Block::Toc(items)))
    }
}

fn is_toc_marker(line: &str) -> bool {
    let text = line.trim().to_ascii_lowercase();
    let Some(rest) = text
        .strip_prefix(":::")
        .or_else(|| text.strip_prefix('['))
    else {
        return false;
    };
    matches!(rest.strip_prefix("toc"), Some(":::") | Some("]"))
}

pub(super) fn render(items: &[TocItem], md: &MarkdownRenderer, refs: &LinkRefs) -> String {
    let mut html = String::from("<ul class=\"toc-list\">\n");
    for item in items {
        html.push_str(&format!(
            "<li class=\"toc-list-{}\"><a href=\"#{}\">{}</a></li>\n",
            item.level,
            encode_double_quoted_attribute(&anchor_name(&item.text)),
            md.render_inline(&item.text, refs)
        ));
    }
    html.push_str("</ul>\n");
    html
}
