// src/markdown.rs
//! Escaping for the chat transport's markup dialect (Telegram MarkdownV2).
//!
//! Three contexts have different reserved sets:
//! - plain text: `_ * [ ] ( ) ~ ` > # + - = | { } . !` and the backslash
//! - inline code: only the backtick and the backslash
//! - link targets inside `(...)`: only `)` and the backslash

use once_cell::sync::Lazy;
use regex::Regex;

static RE_PLAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([_*\[\]()~`>#+\-=|{}.!\\])").expect("markdown plain-text regex")
});

/// Escape free text for use outside code spans and links.
pub fn escape(text: &str) -> String {
    RE_PLAIN.replace_all(text, r"\$1").into_owned()
}

/// Escape text placed between backticks.
pub fn escape_code(text: &str) -> String {
    text.replace('\\', r"\\").replace('`', r"\`")
}

/// Escape a URL placed inside a link's parentheses.
pub fn escape_url(url: &str) -> String {
    url.replace('\\', r"\\").replace(')', r"\)")
}

/// `[label](url)` with both parts escaped for their context.
pub fn link(label: &str, url: &str) -> String {
    format!("[{}]({})", escape(label), escape_url(url))
}

/// `` `text` `` with the content escaped for a code span.
pub fn code(text: &str) -> String {
    format!("`{}`", escape_code(text))
}

/// Cut `text` to `max_chars` characters, marking the cut with `...`.
/// Text that already fits is returned unchanged.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_reserved_chars_are_escaped() {
        assert_eq!(escape("1.5 (approx) - ok!"), r"1\.5 \(approx\) \- ok\!");
        assert_eq!(escape("a_b*c"), r"a\_b\*c");
    }

    #[test]
    fn code_span_only_escapes_backtick_and_backslash() {
        assert_eq!(escape_code("x.y `z` \\"), r"x.y \`z\` \\");
    }

    #[test]
    fn link_escapes_label_and_closing_paren() {
        assert_eq!(
            link("docs v1.0", "https://e.x/a_(b)"),
            r"[docs v1\.0](https://e.x/a_(b\))"
        );
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let s = "é".repeat(120);
        let out = truncate_chars(&s, 100);
        assert_eq!(out.chars().count(), 103);
        assert!(out.ends_with("..."));
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
