//! Plain-text rendering helpers shared by the handlers.

/// Truncate to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_string(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// A horizontal rule of `width` dashes.
pub fn separator(width: usize) -> String {
    "-".repeat(width)
}
