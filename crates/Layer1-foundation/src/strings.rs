//! String utilities shared across layers
//!
//! Char-boundary safe truncation and line tailing for captured terminal text.

// ============================================================================
// Constants
// ============================================================================

/// Appended to text that was cut short
pub const TRUNCATION_MARKER: &str = "...";

/// Returned in place of output that can no longer be captured
pub const SESSION_ENDED: &str = "(session ended)";

// ============================================================================
// Truncation
// ============================================================================

/// Truncate to at most `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed.
///
/// Counts Unicode scalar values, not bytes, so multi-byte text is never split
/// inside a character.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + TRUNCATION_MARKER.len());
            out.push_str(&s[..byte_idx]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => s.to_string(),
    }
}

/// Cut a byte buffer to `max_bytes` and decode it lossily.
///
/// Returns the text and whether anything was dropped.
pub fn truncate_bytes_lossy(bytes: &[u8], max_bytes: usize) -> (String, bool) {
    if bytes.len() <= max_bytes {
        (String::from_utf8_lossy(bytes).into_owned(), false)
    } else {
        (String::from_utf8_lossy(&bytes[..max_bytes]).into_owned(), true)
    }
}

// ============================================================================
// Lines
// ============================================================================

/// Last `n` lines of `text`, ignoring trailing blank lines.
///
/// Terminal captures pad the visible pane with empty rows below the cursor;
/// those rows are not output and must not eat into the line budget.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let start = end.saturating_sub(n);
    lines[start..end].join("\n")
}
