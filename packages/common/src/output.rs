//! Output comparison and size capping shared by the runner and the application layer.

/// Trim surrounding whitespace and normalize `\r\n` line endings to `\n`.
pub fn normalize_output(s: &str) -> String {
    s.replace("\r\n", "\n").trim().to_string()
}

/// Exact comparison of normalized actual and expected output.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}

/// Cap `s` at `max_bytes`, cutting on a char boundary and marking the cut.
pub fn truncate_output(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... (truncated)", &s[..end])
}
