//! Markdown rendering with a pluggable block grammar.
//!
//! Source text is split into lines and walked by a small block tokenizer.
//! At every line each registered [`BlockRule`] gets a chance to claim the
//! block that starts there. Lines no rule claims are collected into runs that
//! are handed to pulldown-cmark unchanged, so everything outside the custom
//! constructs keeps ordinary CommonMark semantics. Lines that continue an
//! open list item are never offered to the rules, and link reference
//! definitions are collected once for the whole document.
//!
//! Rules, in the order they are tried:
//! 1. `toc` - `[toc]` / `:::toc:::` table of contents
//! 2. `callout` - `::: warning` ... `:::` alert containers (recursive)
//! 3. `fence` - fenced code with JSON attributes
//! 4. `table` - pipe tables with multi-line cells and colspan
//! 5. `heading` - ATX headings wrapped in self-links

mod callout;
mod fence;
mod heading;
mod inline;
mod state;
mod table;
mod toc;

use pulldown_cmark::Options;
use regex::Regex;

use crate::config::MarkdownConfig;

use callout::CalloutRule;
use fence::{CodeFence, FenceRule};
use heading::HeadingRule;
use inline::LinkRefs;
use state::BlockState;
use table::{Table, TableRule};
use toc::{TocItem, TocRule};

use inline::LinkClassifier;
use state::indent_width;

#[derive(thiserror::Error, Debug)]
pub enum MarkdownError {
    #[error("invalid markdown extension: {0}")]
    InvalidExtension(String),

    #[error("malformed code fence attributes on line {line}: {source}")]
    FenceAttributes {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A block produced by the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Lines no rule claimed, rendered by pulldown-cmark.
    Markdown(String),
    Fence(CodeFence),
    Table(Table),
    Heading { level: u8, text: String },
    Toc(Vec<TocItem>),
    Callout { kind: String, children: Vec<Block> },
}

/// A block-level grammar rule.
///
/// `parse` is called with `state.line` pointing at a candidate opening line.
/// A rule that claims the block advances `state.line` past everything it
/// consumed and returns the block. A rule that declines returns `Ok(None)` and
/// must leave `state.line` where it found it.
pub trait BlockRule: Send + Sync {
    /// Rule name, used in logs.
    fn name(&self) -> &'static str;

    fn parse(
        &self,
        state: &mut BlockState<'_>,
        md: &MarkdownRenderer,
    ) -> Result<Option<Block>, MarkdownError>;
}

/// Markdown renderer: the block tokenizer plus pulldown-cmark as host renderer.
pub struct MarkdownRenderer {
    rules: Vec<Box<dyn BlockRule>>,
    options: Options,
    links: LinkClassifier,
}

impl MarkdownRenderer {
    /// Create a renderer with the default rule set.
    ///
    /// `internal_links` decides which links stay in the current tab; with no
    /// pattern every link is treated as external.
    pub fn new(
        config: &MarkdownConfig,
        internal_links: Option<Regex>,
    ) -> Result<Self, MarkdownError> {
        let mut options = Options::empty();
        for extension in &config.extensions {
            match extension.as_str() {
                "definition_lists" => options.insert(Options::ENABLE_DEFINITION_LIST),
                "footnotes" => options.insert(Options::ENABLE_FOOTNOTES),
                "gfm" => options.insert(Options::ENABLE_GFM),
                "smart_punctuation" => options.insert(Options::ENABLE_SMART_PUNCTUATION),
                "strikethrough" => options.insert(Options::ENABLE_STRIKETHROUGH),
                "tasklists" => options.insert(Options::ENABLE_TASKLISTS),
                other => return Err(MarkdownError::InvalidExtension(other.to_string())),
            }
        }

        let rules: Vec<Box<dyn BlockRule>> = vec![
            Box::new(TocRule),
            Box::new(CalloutRule::new(config.callout_marker)),
            Box::new(FenceRule),
            Box::new(TableRule),
            Box::new(HeadingRule),
        ];

        Ok(Self {
            rules,
            options,
            links: LinkClassifier::new(internal_links),
        })
    }

    /// Render a markdown document to HTML.
    pub fn render(&self, markdown: &str) -> Result<String, MarkdownError> {
        let refs = LinkRefs::scan(markdown, self.options);
        let blocks = self.parse(markdown)?;
        Ok(self.render_blocks(&blocks, &refs))
    }

    /// Tokenize a markdown document into blocks.
    pub fn parse(&self, markdown: &str) -> Result<Vec<Block>, MarkdownError> {
        let lines: Vec<&str> = markdown.lines().collect();
        let mut state = BlockState::new(&lines);
        self.tokenize(&mut state)
    }

    /// Tokenize `state.line..state.end`, leaving `state.line` at `state.end`.
    ///
    /// Container rules call this recursively on a nested state.
    pub fn tokenize(&self, state: &mut BlockState<'_>) -> Result<Vec<Block>, MarkdownError> {
        let mut blocks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        let mut list = ListTracker::default();

        'lines: while state.line < state.end {
            if !list.continues(state.current()) {
                for rule in &self.rules {
                    let start = state.line;
                    if let Some(block) = rule.parse(state, self)? {
                        debug_assert!(state.line > start, "rule '{}' claimed nothing", rule.name());
                        flush_pending(&mut pending, &mut blocks);
                        list = ListTracker::default();
                        blocks.push(block);
                        continue 'lines;
                    }
                    state.line = start;
                }
            }

            list.push(state.current());
            pending.push(state.current());
            state.line += 1;
        }

        flush_pending(&mut pending, &mut blocks);
        Ok(blocks)
    }

    /// Render tokenized blocks to HTML.
    pub fn render_blocks(&self, blocks: &[Block], refs: &LinkRefs) -> String {
        let mut html = String::new();
        for block in blocks {
            match block {
                Block::Markdown(source) => html.push_str(&self.render_host(source, refs)),
                Block::Fence(fence) => html.push_str(&fence.to_html()),
                Block::Table(table) => html.push_str(&table.to_html(self, refs)),
                Block::Heading { level, text } => {
                    html.push_str(&heading::render(*level, text, self, refs));
                }
                Block::Toc(items) => html.push_str(&toc::render(items, self, refs)),
                Block::Callout { kind, children } => {
                    html.push_str(&callout::render(kind, &self.render_blocks(children, refs)));
                }
            }
        }
        html
    }

    /// Render a run of unclaimed lines with pulldown-cmark.
    fn render_host(&self, source: &str, refs: &LinkRefs) -> String {
        inline::render_host(source, self.options, &self.links, refs)
    }

    /// Render a single line of inline markdown (no surrounding `<p>`).
    pub fn render_inline(&self, text: &str, refs: &LinkRefs) -> String {
        inline::render_inline(text, self.options, &self.links, refs)
    }
}

/// Follows the outermost list item open in a run of passthrough lines.
#[derive(Debug, Default)]
struct ListTracker {
    /// Content indent of the open item.
    open: Option<usize>,
    previous_blank: bool,
}

impl ListTracker {
    fn push(&mut self, line: &str) {
        let blank = line.trim().is_empty();
        let indent = indent_width(line);
        if let Some(content) = list_item_indent(line)
            && self.open.is_none_or(|outer| indent < outer)
        {
            self.open = Some(content);
        } else if !blank
            && let Some(outer) = self.open
            && indent < outer
            && self.previous_blank
        {
            self.open = None;
        }
        self.previous_blank = blank;
    }

    /// Whether `line` belongs to the open item's content.
    fn continues(&self, line: &str) -> bool {
        self.open
            .is_some_and(|indent| !line.trim().is_empty() && indent_width(line) >= indent)
    }
}

/// Content indent of a list item opener (`- x`, `1. x`, `2) x`).
fn list_item_indent(line: &str) -> Option<usize> {
    let indent = indent_width(line);
    if indent > 3 {
        return None;
    }
    let text = line.trim_start();
    let marker = match text.chars().next()? {
        '-' | '+' | '*' => 1,
        '0'..='9' => {
            let digits = text.bytes().take_while(u8::is_ascii_digit).count();
            if digits > 9 || !matches!(text.as_bytes().get(digits), Some(b'.' | b')')) {
                return None;
            }
            digits + 1
        }
        _ => return None,
    };
    let rest = &text[marker..];
    if rest.trim().is_empty() {
        return Some(indent + marker + 1);
    }
    let spaces = rest.len() - rest.trim_start_matches(' ').len();
    match spaces {
        0 => None,
        1..=4 => Some(indent + marker + spaces),
        _ => Some(indent + marker + 1),
    }
}

fn flush_pending(pending: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if pending.is_empty() {
        return;
    }
    let mut source = pending.join("\n");
    source.push('\n');
    pending.clear();
    blocks.push(Block::Markdown(source));
}

#[cfg(test)]
mod tests {
    use super::*;
    use fence::FenceAttributes;
    use pretty_assertions::assert_eq;

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::new(&MarkdownConfig::default(), None).unwrap()
    }

    #[test]
    fn test_plain_markdown_passes_through() {
        let html = renderer().render("Some *emphasis* here.\n\n- one\n- two").unwrap();
        assert!(html.contains("<p>Some <em>emphasis</em> here.</p>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn test_rules_split_passthrough_runs() {
        let blocks = renderer().parse("intro\n\n## Part\n\noutro").unwrap();
        assert_eq!(
            blocks,
            vec![
                Block::Markdown("intro\n\n".to_string()),
                Block::Heading {
                    level: 2,
                    text: "Part".to_string()
                },
                Block::Markdown("\noutro\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_heading_anchor() {
        let html = renderer().render("### Hello World").unwrap();
        assert!(html.contains("href=\"#hello_world\""));
        assert!(html.contains("name=\"hello_world\""));
        assert!(html.contains("<h3>Hello World<span"));
    }

    #[test]
    fn test_fence_with_attributes() {
        let html = renderer()
            .render("```{\"title\":\"x\",\"language\":\"js\"}\nA\nB\n```")
            .unwrap();
        assert!(html.contains("<pre><code class=\"lang-js\">A\nB</code></pre>"));
        assert!(html.contains("<h5 class=\"card-header fence-header\">x</h5>"));
    }

    #[test]
    fn test_fence_one_liner() {
        let blocks = renderer().parse("``` one liner ```").unwrap();
        assert_eq!(
            blocks,
            vec![Block::Fence(CodeFence {
                attrs: FenceAttributes::default(),
                content: "one liner".to_string(),
            })]
        );
    }

    #[test]
    fn test_malformed_fence_attributes_is_an_error() {
        let result = renderer().render("```{\"title\": \n code\n```");
        assert!(matches!(
            result,
            Err(MarkdownError::FenceAttributes { line: 1, .. })
        ));
    }

    #[test]
    fn test_table_multiline_cells() {
        let html = renderer().render("A|B\n-|-\n1|2\\\n3|4").unwrap();
        assert!(html.contains("<td>1<br />3</td>"));
        assert!(html.contains("<td>2<br />4</td>"));
        assert_eq!(html.matches("<tr>").count(), 2);
    }

    #[test]
    fn test_callout_renders_nested_blocks() {
        let html = renderer()
            .render("::: error\n## Careful\n\n```\nrm -rf\n```\n:::\nafter")
            .unwrap();
        assert!(html.contains("alert alert-danger"));
        assert!(html.contains("name=\"careful\""));
        assert!(html.contains("<code>rm -rf</code>"));
        assert!(html.contains("<p>after</p>"));
    }

    #[test]
    fn test_toc_lists_headings_outside_fences() {
        let source = "[toc]\n# One\n```\n# not a heading\n```\n## Two ##";
        let html = renderer().render(source).unwrap();
        assert!(html.contains("<li class=\"toc-list-1\"><a href=\"#one\">One</a></li>"));
        assert!(html.contains("<li class=\"toc-list-2\"><a href=\"#two\">Two</a></li>"));
        assert!(!html.contains("href=\"#not_a_heading\""));
    }

    #[test]
    fn test_links_external_without_pattern() {
        let html = renderer().render("[docs](/docs/intro.html)").unwrap();
        assert!(html.contains("<a href=\"/docs/intro.html\" target=\"_blank\">docs</a>"));
    }

    #[test]
    fn test_links_internal_with_pattern() {
        let md = MarkdownRenderer::new(
            &MarkdownConfig::default(),
            Some(Regex::new("^/").unwrap()),
        )
        .unwrap();
        let html = md
            .render("[docs](/docs/intro.html) and [out](https://example.com)")
            .unwrap();
        assert!(html.contains("<a href=\"/docs/intro.html\">docs</a>"));
        assert!(html.contains("<a href=\"https://example.com\" target=\"_blank\">out</a>"));
    }

    #[test]
    fn test_invalid_extension() {
        let config = MarkdownConfig {
            extensions: vec!["not_a_real_extension".to_string()],
            ..MarkdownConfig::default()
        };
        assert!(MarkdownRenderer::new(&config, None).is_err());
    }

    #[test]
    fn test_reference_defined_after_heading() {
        let html = renderer()
            .render("See [the docs][1].\n\n## Next\n\n[1]: /docs/intro.html")
            .unwrap();
        assert!(html.contains("<a href=\"/docs/intro.html\" target=\"_blank\">the docs</a>"));
        assert!(!html.contains("[1]"));
    }

    #[test]
    fn test_fence_inside_list_item_stays_in_list() {
        let html = renderer()
            .render("1. Step one\n   ```\n   code\n   ```\n2. Step two")
            .unwrap();
        assert_eq!(html.matches("<ol").count(), 1);
        assert!(html.contains("<code>code\n</code>"));
        assert!(!html.contains("card fence"));
    }

    #[test]
    fn test_heading_after_list_is_still_claimed() {
        let blocks = renderer().parse("- item\n   more\n## After").unwrap();
        assert_eq!(
            blocks.last(),
            Some(&Block::Heading {
                level: 2,
                text: "After".to_string()
            })
        );
    }

    #[test]
    fn test_list_tracker() {
        let open = |lines: &[&str]| {
            let mut list = ListTracker::default();
            lines.iter().for_each(|line| list.push(line));
            list.open
        };
        assert_eq!(open(&["1. Step one"]), Some(3));
        assert_eq!(open(&["- a", "  - nested"]), Some(2));
        assert_eq!(open(&["- a", "", "paragraph"]), None);
        assert_eq!(open(&["- a", "lazy"]), Some(2));
        assert_eq!(open(&["plain text"]), None);
        assert_eq!(open(&["---"]), None);
    }
}
