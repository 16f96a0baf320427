//! Reply Parsing
//!
//! Raw agent replies may carry inline tool markers (`[TOOL_CALL]name[/TOOL_CALL]`)
//! and the termination phrase. Markers are private to the speaker: they are removed
//! from what the other party and the transcript see, and surfaced as tool events.

use regex::Regex;
use std::sync::LazyLock;

/// Literal phrase that ends the conversation when present anywhere in a reply.
pub const TERMINATION_MARKER: &str = "END OF CONVERSATION";

pub const TOOL_CALL_OPEN: &str = "[TOOL_CALL]";
pub const TOOL_CALL_CLOSE: &str = "[/TOOL_CALL]";

static TOOL_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[TOOL_CALL\](.*?)\[/TOOL_CALL\]").expect("tool call pattern is valid")
});

/// Wraps a tool name in the inline marker.
pub fn tool_marker(name: &str) -> String {
    format!("{TOOL_CALL_OPEN}{name}{TOOL_CALL_CLOSE}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// The reply exactly as produced.
    pub raw: String,
    /// The reply with every tool marker removed and surrounding whitespace trimmed.
    pub clean: String,
    /// Tool names in the order they appear.
    pub tool_calls: Vec<String>,
    /// Whether the termination phrase appears in `raw`.
    pub is_terminal: bool,
}

impl ParsedReply {
    pub fn parse(raw: impl Into<String>, termination_marker: &str) -> Self {
        let raw = raw.into();
        let tool_calls = TOOL_CALL_RE
            .captures_iter(&raw)
            .map(|c| c[1].trim().to_string())
            .collect();
        let clean = TOOL_CALL_RE.replace_all(&raw, "").trim().to_string();
        let is_terminal = !termination_marker.is_empty() && raw.contains(termination_marker);
        Self {
            raw,
            clean,
            tool_calls,
            is_terminal,
        }
    }

    /// A raw tool-use request leaking into prose means the runtime did not execute it.
    pub fn has_surfaced_tool_use(&self) -> bool {
        self.raw.contains("toolUse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_and_extract_in_order() {
        let parsed = ParsedReply::parse(
            "A[TOOL_CALL]x[/TOOL_CALL]B[TOOL_CALL]y[/TOOL_CALL]C",
            TERMINATION_MARKER,
        );
        assert_eq!(parsed.clean, "ABC");
        assert_eq!(parsed.tool_calls, vec!["x", "y"]);
        assert!(!parsed.is_terminal);
    }

    #[test]
    fn test_plain_reply_is_untouched() {
        let parsed = ParsedReply::parse("  Just words.  ", TERMINATION_MARKER);
        assert_eq!(parsed.clean, "Just words.");
        assert!(parsed.tool_calls.is_empty());
    }

    #[test]
    fn test_termination_anywhere() {
        let parsed = ParsedReply::parse(
            "Approved. END OF CONVERSATION and thanks",
            TERMINATION_MARKER,
        );
        assert!(parsed.is_terminal);

        let lower = ParsedReply::parse("end of conversation", TERMINATION_MARKER);
        assert!(!lower.is_terminal);
    }

    #[test]
    fn test_marker_only_reply_has_empty_clean_text() {
        let parsed = ParsedReply::parse("[TOOL_CALL]lookup[/TOOL_CALL]\n", TERMINATION_MARKER);
        assert_eq!(parsed.clean, "");
        assert_eq!(parsed.tool_calls, vec!["lookup"]);
    }

    #[test]
    fn test_multiline_marker_and_unclosed_marker() {
        let parsed = ParsedReply::parse(
            "a[TOOL_CALL]\nmulti\n[/TOOL_CALL]b [TOOL_CALL]open",
            TERMINATION_MARKER,
        );
        assert_eq!(parsed.tool_calls, vec!["multi"]);
        assert_eq!(parsed.clean, "ab [TOOL_CALL]open");
    }

    #[test]
    fn test_surfaced_tool_use() {
        let parsed = ParsedReply::parse(
            r#"{"action": "toolUse", "tool_name": "x"}"#,
            TERMINATION_MARKER,
        );
        assert!(parsed.has_surfaced_tool_use());
    }

    #[test]
    fn test_tool_marker_round_trips_through_parser() {
        let raw = format!("{}Done", tool_marker("lookup_medical_policy"));
        let parsed = ParsedReply::parse(raw, TERMINATION_MARKER);
        assert_eq!(parsed.tool_calls, vec!["lookup_medical_policy"]);
        assert_eq!(parsed.clean, "Done");
    }
}
