use html_escape::encode_double_quoted_attribute;

use super::state::{BlockState, indent_width, marker_run};
use super::{Block, BlockRule, MarkdownError, MarkdownRenderer};

/// Alert containers:
///
/// ```text
/// ::: warning
/// Body, tokenized with the full rule set.
/// :::
/// ```
pub struct CalloutRule {
    marker: char,
}

impl CalloutRule {
    pub fn new(marker: char) -> Self {
        Self { marker }
    }
}

impl BlockRule for CalloutRule {
    fn name(&self) -> &'static str {
        "callout"
    }

    fn parse(
        &self,
        state: &mut BlockState<'_>,
        md: &MarkdownRenderer,
    ) -> Result<Option<Block>, MarkdownError> {
        let line = state.current();
        if indent_width(line) > 3 {
            return Ok(None);
        }
        let text = line.trim_start();
        let run = marker_run(text, self.marker);
        if run < 3 {
            return Ok(None);
        }
        let params = &text[run * self.marker.len_utf8()..];

        let mut close = state.line + 1;
        let mut closed = false;
        while close < state.end {
            if self.is_closing(state.line_at(close), run) {
                closed = true;
                break;
            }
            close += 1;
        }

        let mut inner = state.nested(state.line + 1, close);
        let children = md.tokenize(&mut inner)?;

        state.line = if closed { close + 1 } else { close };
        Ok(Some(Block::Callout {
            kind: alert_kind(params),
            children,
        }))
    }
}

impl CalloutRule {
    fn is_closing(&self, line: &str, min_run: usize) -> bool {
        if indent_width(line) > 3 {
            return false;
        }
        let text = line.trim_start();
        let run = marker_run(text, self.marker);
        run >= min_run && text[run * self.marker.len_utf8()..].trim().is_empty()
    }
}

fn alert_kind(params: &str) -> String {
    match params.trim().to_lowercase().as_str() {
        "" => "info".to_string(),
        "error" => "danger".to_string(),
        other => other.to_string(),
    }
}

pub(super) fn render(kind: &str, body: &str) -> String {
    format!(
        "<div class=\"card fence\">\n<div class=\"card-body fence-body\">\n<div class=\"alert alert-{}\" role=\"alert\">\n{body}</div>\n</div>\n</div>\n",
        encode_double_quoted_attribute(kind)
    )
}
