//! Splits `${…}` interpolation segments out of string literals.

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Lit(String),
    Expr(String),
}

/// Splits a string into literal and `${expr}` segments. A `${` opens a
/// segment; the balanced matching `}` closes it. A `${` with no balanced
/// closer is literal text, not an error. No escaping.
pub fn split_segments(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut remaining = input;

    while let Some(start) = remaining.find("${") {
        match find_balanced_close(&remaining[start + 2..]) {
            Some(end) => {
                if start > 0 {
                    segments.push(Segment::Lit(remaining[..start].to_string()));
                }
                let inner = &remaining[start + 2..start + 2 + end];
                segments.push(Segment::Expr(inner.to_string()));
                remaining = &remaining[start + 2 + end + 1..];
            }
            None => {
                // Unbalanced opener: the rest is literal.
                segments.push(Segment::Lit(remaining.to_string()));
                return segments;
            }
        }
    }

    if !remaining.is_empty() {
        segments.push(Segment::Lit(remaining.to_string()));
    }

    segments
}

/// Byte offset of the `}` that balances an already-open segment, if any.
fn find_balanced_close(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// If the whole string (after trimming surrounding whitespace) is exactly
/// one `${expr}`, returns the expression source. Such a string resolves to
/// the expression's native value instead of a string.
pub fn whole_expression(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if !trimmed.starts_with("${") || !trimmed.ends_with('}') {
        return None;
    }
    let end = find_balanced_close(&trimmed[2..])?;
    // The balanced closer must be the final character.
    if 2 + end + 1 != trimmed.len() {
        return None;
    }
    Some(&trimmed[2..2 + end])
}
