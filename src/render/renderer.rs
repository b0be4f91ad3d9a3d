use crate::buffer::{ChatMessage, RollingBuffer};
use crate::render::wrap::wrap_text;

const BOLD_OPEN: &str = "<b>";
const BOLD_CLOSE: &str = "</b>";

/// Formats a [`RollingBuffer`] into bordered, wrapped text.
///
/// The separator is independent of the wrap width.
#[derive(Debug, Clone)]
pub struct Renderer {
    width: usize,
    separator: String,
}

impl Renderer {
    pub fn new(width: usize, separator_char: char, separator_len: usize) -> Self {
        Self {
            width: width.max(1),
            separator: separator_char.to_string().repeat(separator_len),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Renders the whole buffer, oldest message first.
    ///
    /// With `max_lines > 0` only the last `max_lines` lines are kept, which
    /// may cut a wrapped message in half.
    pub fn render(&self, buffer: &RollingBuffer, bold_authors: bool, max_lines: usize) -> String {
        let mut lines = vec![self.separator.clone()];
        for (idx, message) in buffer.iter().enumerate() {
            if idx > 0 {
                lines.push(self.separator.clone());
            }
            lines.extend(self.message_lines(message, bold_authors));
        }
        lines.push(self.separator.clone());

        if max_lines > 0 && lines.len() > max_lines {
            lines.drain(..lines.len() - max_lines);
        }
        lines.join("\n")
    }

    fn message_lines(&self, message: &ChatMessage, bold_authors: bool) -> Vec<String> {
        let wrapped = wrap_text(&message.header(), self.width);
        if !bold_authors || message.author.is_empty() {
            return wrapped;
        }

        let start = message.header_prefix().chars().count();
        let end = start + message.author.chars().count();
        let mut offset = 0;

        wrapped
            .into_iter()
            .map(|line| {
                let n = line.chars().count();
                let marked = mark_span(&line, start.saturating_sub(offset), end.saturating_sub(offset));
                offset += n;
                marked
            })
            .collect()
    }
}

/// Wraps the characters `[start, end)` of `line` in bold markers. Positions
/// are clamped to the line, and an empty span leaves it untouched.
fn mark_span(line: &str, start: usize, end: usize) -> String {
    let n = line.chars().count();
    let (start, end) = (start.min(n), end.min(n));
    if start >= end {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + BOLD_OPEN.len() + BOLD_CLOSE.len());
    for (i, c) in line.chars().enumerate() {
        if i == start {
            out.push_str(BOLD_OPEN);
        }
        out.push(c);
        if i + 1 == end {
            out.push_str(BOLD_CLOSE);
        }
    }
    out
}

impl RollingBuffer {
    /// Convenience for `renderer.render(self, ..)`.
    pub fn render(&self, renderer: &Renderer, bold_authors: bool, max_lines: usize) -> String {
        renderer.render(self, bold_authors, max_lines)
    }
}
