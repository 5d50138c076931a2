// src/util.rs — Shared utility functions

/// Shorten text for log lines to at most `max_chars` characters, marking the
/// cut with an ellipsis.
pub fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…", &s[..cut]),
    }
}

/// Current Unix time in whole seconds, as used in OpenAI `created` fields.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
