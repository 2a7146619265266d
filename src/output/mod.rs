// Output formatting for the CLI.

pub mod terminal;

/// Truncate a string to at most `max` characters, appending an ellipsis
/// when anything was cut. Char-based so multi-byte input can't panic.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{truncated}…")
    }
}
