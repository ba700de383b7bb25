//! Removal of terminal escape sequences from captured output.

use std::{borrow::Cow, sync::OnceLock};

use regex::Regex;

// Two-byte ESC sequences and CSI sequences (colors, cursor movement).
const ANSI_PATTERN: &str = r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])";

fn ansi_regex() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(ANSI_PATTERN).expect("ANSI pattern is a valid regex"))
}

/// Strips ANSI escape sequences from `text`.
///
/// ```rust
/// use stratum_core::runner::strip_ansi;
///
/// assert_eq!(strip_ansi("\u{1b}[32mSuccess!\u{1b}[0m"), "Success!");
/// ```
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ansi_regex().replace_all(text, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_color_and_cursor_sequences() {
        let raw = "\u{1b}[0m\u{1b}[1m\u{1b}[32mTerraform has been successfully initialized!\u{1b}[0m";
        assert_eq!(
            strip_ansi(raw),
            "Terraform has been successfully initialized!"
        );
        assert_eq!(strip_ansi("\u{1b}[2K\u{1b}[1Gdone"), "done");
    }

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(strip_ansi("Plan: 1 to add"), Cow::Borrowed(_)));
    }
}
