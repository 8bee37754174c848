//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;

use regex::Regex;
use std::sync::OnceLock;

/// Host suffix appended to a world's compacted name
const WORLD_HOST_SUFFIX: &str = "runescape.com";

fn digits_re() -> &'static Regex {
    static DIGITS_RE: OnceLock<Regex> = OnceLock::new();
    DIGITS_RE.get_or_init(|| Regex::new(r"\d+").expect("Invalid regex pattern"))
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Extract the first run of ASCII digits from text
///
/// Returns `None` when the text holds no digits or the run overflows `i64`.
pub fn extract_first_number(text: &str) -> Option<i64> {
    digits_re()
        .find(text)
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// Derive the probe URL for a world from its display name
///
/// Spaces are removed and the name is lowercased, so `"World 301"` becomes
/// `http://world301.runescape.com/`.
pub fn world_url(name: &str) -> String {
    let host: String = name
        .chars()
        .filter(|c| *c != ' ')
        .collect::<String>()
        .to_lowercase();
    format!("http://{host}.{WORLD_HOST_SUFFIX}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  hello   world  "), "hello world");
        assert_eq!(normalize_whitespace("United\n\n Kingdom"), "United Kingdom");
    }

    #[test]
    fn test_extract_first_number() {
        assert_eq!(extract_first_number("50 players"), Some(50));
        assert_eq!(extract_first_number("slu-world-301"), Some(301));
        assert_eq!(extract_first_number("1,234 players"), Some(1));
        assert_eq!(extract_first_number("FULL"), None);
        assert_eq!(extract_first_number(""), None);
    }

    #[test]
    fn test_world_url() {
        assert_eq!(world_url("World 301"), "http://world301.runescape.com/");
        assert_eq!(world_url("OldSchool 1"), "http://oldschool1.runescape.com/");
    }

    #[test]
    fn test_world_url_is_pure() {
        assert_eq!(world_url("World 42"), world_url("World 42"));
    }
}
