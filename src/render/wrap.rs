/// Whitespace that separates wrap chunks.
fn is_wrap_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Splits `text` into alternating runs of whitespace and non-whitespace.
fn split_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;

    for (i, c) in text.char_indices() {
        let space = is_wrap_space(c);
        if let Some(prev) = current {
            if prev != space {
                chunks.push(&text[start..i]);
                start = i;
            }
        }
        current = Some(space);
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Greedy word wrap to `width` characters.
///
/// Whitespace is kept verbatim, so concatenating the returned lines gives
/// back `text` unchanged. A run of non-whitespace is only split when it is
/// longer than `width` on its own; the split pieces fill the remainder of
/// the current line and then whole lines. Hyphens get no special treatment.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut chunks: Vec<String> = split_chunks(text)
        .into_iter()
        .rev()
        .map(str::to_string)
        .collect();
    let mut lines = Vec::new();

    while !chunks.is_empty() {
        let mut line = String::new();
        let mut len = 0;

        while let Some(chunk) = chunks.last() {
            let n = chunk.chars().count();
            if len + n > width {
                break;
            }
            line.push_str(chunk);
            len += n;
            chunks.pop();
        }

        if let Some(chunk) = chunks.last_mut() {
            let space_left = width - len;
            if chunk.chars().count() > width && space_left > 0 {
                if let Some((split, _)) = chunk.char_indices().nth(space_left) {
                    line.push_str(&chunk[..split]);
                    *chunk = chunk[split..].to_string();
                }
            }
        }

        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines
}
