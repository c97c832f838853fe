/// Line cursor shared by the block rules.
///
/// `line` is the next unconsumed line, `end` is the exclusive boundary of
/// the enclosing block. Container rules hand a narrower state to the
/// tokenizer via [`BlockState::nested`].
#[derive(Debug, Clone, Copy)]
pub struct BlockState<'a> {
    lines: &'a [&'a str],
    pub line: usize,
    pub end: usize,
}

impl<'a> BlockState<'a> {
    pub fn new(lines: &'a [&'a str]) -> Self {
        Self {
            lines,
            line: 0,
            end: lines.len(),
        }
    }

    /// The line under the cursor.
    pub fn current(&self) -> &'a str {
        self.line_at(self.line)
    }

    pub fn line_at(&self, index: usize) -> &'a str {
        self.lines.get(index).copied().unwrap_or("")
    }

    /// Lines from `start` up to the enclosing block's end.
    pub fn remaining_from(&self, start: usize) -> &'a [&'a str] {
        let start = start.min(self.end);
        &self.lines[start..self.end]
    }

    /// A state covering `start..end` of the same source.
    pub fn nested(&self, start: usize, end: usize) -> Self {
        Self {
            lines: self.lines,
            line: start,
            end: end.min(self.end),
        }
    }
}

/// Indentation width of a line, with tabs expanding to the next multiple of 4.
pub fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4 - width % 4,
            _ => break,
        }
    }
    width
}

/// Length of the run of `marker` at the start of `text`.
pub fn marker_run(text: &str, marker: char) -> usize {
    text.chars().take_while(|&c| c == marker).count()
}
