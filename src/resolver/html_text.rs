//! HTML-to-text normalization for rich-text editor values.
//!
//! Editor fields arrive wrapped in markup; every string is normalized before
//! reference substitution. This can mangle non-prose values such as regex
//! patterns, so the normalizer is isolated here where a future opt-out flag
//! would gate it.

use std::sync::OnceLock;

use regex::Regex;

fn block_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</li>").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]+>").unwrap())
}

/// Strip markup and decode the common entities, preserving line structure.
pub fn html_to_text(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return input.to_string();
    }
    let broken = block_break_re().replace_all(input, "\n");
    let stripped = tag_re().replace_all(&broken, "");
    stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passthrough() {
        assert_eq!(html_to_text("hello world"), "hello world");
        assert_eq!(html_to_text("{{ question }}"), "{{ question }}");
    }

    #[test]
    fn test_strips_tags() {
        assert_eq!(
            html_to_text("<p>Summarize <b>this</b></p>"),
            "Summarize this\n"
        );
    }

    #[test]
    fn test_breaks_become_newlines() {
        assert_eq!(html_to_text("line one<br/>line two"), "line one\nline two");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(html_to_text("a &amp; b &lt;= c&nbsp;d"), "a & b <= c d");
    }

    #[test]
    fn test_comparison_survives() {
        // a bare '<' not forming a tag is left alone
        assert_eq!(html_to_text("x < y and y > z"), "x < y and y > z");
    }
}
