//! Pipe tables with multi-line cells, colspan and striping.
//!
//! ```text
//! Name | Notes
//! :--- | ---
//! a    | first line \
//!      | second line
//! b    ||
//! {: class="table table-striped"}
//! ```
//!
//! A trailing single backslash continues the row on the next line. An empty
//! cell (`||`) widens the cell before it.

use html_escape::encode_double_quoted_attribute;

use super::state::{BlockState, indent_width};
use super::{Block, BlockRule, LinkRefs, MarkdownError, MarkdownRenderer};

const STRIPED_MARKER: &str = "{: class=\"table table-striped\"}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    None,
    Left,
    Center,
    Right,
}

impl Align {
    fn style(self) -> Option<&'static str> {
        match self {
            Align::None => None,
            Align::Left => Some("left"),
            Align::Center => Some("center"),
            Align::Right => Some("right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Inline markdown; continued lines are already joined with `<br />`.
    pub text: String,
    pub colspan: usize,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub striped: bool,
    pub header: Vec<Cell>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn to_html(&self, md: &MarkdownRenderer, refs: &LinkRefs) -> String {
        let mut html = String::from(if self.striped {
            "<table class=\"table table-striped\">\n"
        } else {
            "<table class=\"table\">\n"
        });

        html.push_str("<thead>\n");
        push_row(&mut html, "th", &self.header, md, refs);
        html.push_str("</thead>\n");

        if !self.rows.is_empty() {
            html.push_str("<tbody>\n");
            for row in &self.rows {
                push_row(&mut html, "td", row, md, refs);
            }
            html.push_str("</tbody>\n");
        }

        html.push_str("</table>\n");
        html
    }
}

fn push_row(html: &mut String, tag: &str, cells: &[Cell], md: &MarkdownRenderer, refs: &LinkRefs) {
    html.push_str("<tr>\n");
    for cell in cells {
        html.push('<');
        html.push_str(tag);
        if cell.colspan > 1 {
            html.push_str(&format!(" colspan=\"{}\"", cell.colspan));
        }
        if let Some(align) = cell.align.style() {
            html.push_str(&format!(
                " style=\"text-align:{}\"",
                encode_double_quoted_attribute(align)
            ));
        }
        html.push('>');
        let rendered: Vec<String> = cell
            .text
            .split("<br />")
            .map(|segment| md.render_inline(segment, refs))
            .collect();
        html.push_str(&rendered.join("<br />"));
        html.push_str(&format!("</{tag}>\n"));
    }
    html.push_str("</tr>\n");
}

pub struct TableRule;

impl BlockRule for TableRule {
    fn name(&self) -> &'static str {
        "table"
    }

    fn parse(
        &self,
        state: &mut BlockState<'_>,
        _md: &MarkdownRenderer,
    ) -> Result<Option<Block>, MarkdownError> {
        if state.line + 2 > state.end {
            return Ok(None);
        }
        let header_line = state.current();
        let delimiter_line = state.line_at(state.line + 1);
        if indent_width(header_line) > 3 || indent_width(delimiter_line) > 3 {
            return Ok(None);
        }

        let header_text = header_line.trim();
        if !header_text.contains('|') {
            return Ok(None);
        }
        let Some(aligns) = parse_delimiter(delimiter_line) else {
            return Ok(None);
        };
        let header_columns = escaped_split(strip_outer_pipes(header_text));
        let column_count = header_columns.len();
        if column_count > aligns.len() {
            return Ok(None);
        }

        let header_contents = header_columns.iter().map(|c| c.trim().to_string()).collect();
        let header = build_cells(&header_columns, header_contents, column_count, &aligns);

        let mut rows = Vec::new();
        let mut pending: Option<PendingRow<'_>> = None;
        let mut next = state.line + 2;
        while next < state.end {
            let line = state.line_at(next);
            let text = line.trim();
            if !text.contains('|') || indent_width(line) > 3 || text == STRIPED_MARKER {
                break;
            }

            let columns = escaped_split(strip_outer_pipes(text));
            let continues = columns
                .get(column_count - 1)
                .or(columns.last())
                .is_some_and(|last| ends_with_single_backslash(last.trim()));

            let row = pending.get_or_insert_with(|| PendingRow {
                first_columns: columns.clone(),
                segments: vec![Vec::new(); column_count],
            });
            for (i, segments) in row.segments.iter_mut().enumerate() {
                let cell = columns.get(i).map(|c| c.trim()).unwrap_or("");
                let cell = if continues && ends_with_single_backslash(cell) {
                    cell[..cell.len() - 1].trim_end()
                } else {
                    cell
                };
                if !cell.is_empty() {
                    segments.push(cell.to_string());
                }
            }

            if !continues && let Some(row) = pending.take() {
                rows.push(row.finish(column_count, &aligns));
            }
            next += 1;
        }
        if let Some(row) = pending.take() {
            rows.push(row.finish(column_count, &aligns));
        }

        let striped = next < state.end && state.line_at(next).trim() == STRIPED_MARKER;
        if striped {
            next += 1;
        }

        state.line = next;
        Ok(Some(Block::Table(Table {
            striped,
            header,
            rows,
        })))
    }
}

/// A body row that may still be continued on following lines.
struct PendingRow<'a> {
    /// Columns of the row's first line; they decide the colspan layout.
    first_columns: Vec<&'a str>,
    segments: Vec<Vec<String>>,
}

impl PendingRow<'_> {
    fn finish(self, column_count: usize, aligns: &[Align]) -> Vec<Cell> {
        let contents = self
            .segments
            .into_iter()
            .map(|segments| segments.join("<br />"))
            .collect();
        build_cells(&self.first_columns, contents, column_count, aligns)
    }
}

fn build_cells(
    raw: &[&str],
    contents: Vec<String>,
    column_count: usize,
    aligns: &[Align],
) -> Vec<Cell> {
    let mut cells: Vec<Cell> = Vec::with_capacity(column_count);
    for (i, text) in contents.into_iter().enumerate().take(column_count) {
        let widens_previous = i > 0 && raw.get(i).is_some_and(|c| c.is_empty());
        if widens_previous && let Some(previous) = cells.last_mut() {
            previous.colspan += 1;
            continue;
        }
        cells.push(Cell {
            text,
            colspan: 1,
            align: aligns.get(i).copied().unwrap_or_default(),
        });
    }
    cells
}

fn ends_with_single_backslash(text: &str) -> bool {
    text.ends_with('\\') && !text.ends_with("\\\\")
}

fn strip_outer_pipes(text: &str) -> &str {
    let text = text.strip_prefix('|').unwrap_or(text);
    text.strip_suffix('|').unwrap_or(text)
}

/// Parse the delimiter row into column alignments.
fn parse_delimiter(line: &str) -> Option<Vec<Align>> {
    let text = line.trim();
    if text.is_empty()
        || !text.starts_with(['|', '-', ':'])
        || !text.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
    {
        return None;
    }

    let columns: Vec<&str> = text.split('|').collect();
    let last = columns.len() - 1;
    let mut aligns = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let column = column.trim();
        if column.is_empty() {
            if i == 0 || i == last {
                continue;
            }
            return None;
        }

        let left = column.starts_with(':');
        let right = column.ends_with(':') && column.len() > 1;
        let dashes = column.trim_start_matches(':').trim_end_matches(':');
        if dashes.is_empty() || !dashes.chars().all(|c| c == '-') {
            return None;
        }

        aligns.push(match (left, right) {
            (true, true) => Align::Center,
            (true, false) => Align::Left,
            (false, true) => Align::Right,
            (false, false) => Align::None,
        });
    }

    (!aligns.is_empty()).then_some(aligns)
}

/// Split a row on `|`, ignoring escaped pipes and pipes inside code spans.
///
/// An unclosed backtick does not open a code span; scanning resumes just
/// after it.
fn escaped_split(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut columns = Vec::new();
    let mut pos = 0;
    let mut column_start = 0;
    let mut escapes = 0;
    let mut in_code = false;
    let mut code_start = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'`' if in_code => in_code = false,
            b'`' if escapes % 2 == 0 => {
                in_code = true;
                code_start = pos;
            }
            b'|' if escapes % 2 == 0 && !in_code => {
                columns.push(&text[column_start..pos]);
                column_start = pos + 1;
            }
            _ => {}
        }

        if bytes[pos] == b'\\' {
            escapes += 1;
        } else {
            escapes = 0;
        }
        pos += 1;

        if pos == bytes.len() && in_code {
            in_code = false;
            escapes = 0;
            pos = code_start + 1;
        }
    }

    columns.push(&text[column_start..]);
    columns
}
