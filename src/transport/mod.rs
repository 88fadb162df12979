// src/transport/mod.rs
//! Outbound delivery of digest text.

pub mod commands;
pub mod telegram;

use std::sync::Mutex;

use anyhow::Result;

pub use telegram::TelegramTransport;

/// Telegram's limit, counted in UTF-16 code units.
pub const DEFAULT_MESSAGE_LIMIT: usize = 4096;

#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver one message. Text longer than the transport limit must be split
    /// by the caller (see [`split_message`]).
    async fn send(&self, text: &str) -> Result<()>;

    /// Maximum message length in UTF-16 code units.
    fn message_limit(&self) -> usize {
        DEFAULT_MESSAGE_LIMIT
    }

    fn name(&self) -> &'static str;
}

fn units(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Split `text` into chunks of at most `limit` UTF-16 units.
///
/// Cuts prefer blank lines (digest block boundaries), then line breaks, then
/// spaces; a single word longer than `limit` is cut on a char boundary.
/// A cut never lands after an unpaired `\` or inside a code span or link,
/// unless one such span alone exceeds `limit`.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || units(text) <= limit {
        return vec![text.to_string()];
    }
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let n = chars.len();
    let byte_at = |i: usize| chars.get(i).map_or(text.len(), |(b, _)| *b);
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0usize);
    for (_, ch) in &chars {
        prefix.push(prefix[prefix.len() - 1] + ch.len_utf16());
    }
    let states = cut_states(text);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && prefix[end + 1] - prefix[start] <= limit {
            end += 1;
        }
        if prefix[n] - prefix[start] <= limit {
            chunks.push(&text[byte_at(start)..]);
            break;
        }
        let (cut, resume) = choose_cut(text, start, end, &states, &byte_at);
        chunks.push(&text[byte_at(start)..byte_at(cut)]);
        start = resume;
    }
    chunks
        .into_iter()
        .map(|c| c.trim_start_matches('\n').trim_end().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Markup state just before each char (and at the end of the text).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutState {
    Clean,
    /// Right after an unpaired backslash.
    Escape,
    /// Inside a code span or a `[label](url)` link.
    Span,
}

fn cut_states(text: &str) -> Vec<CutState> {
    let mut states = Vec::with_capacity(text.len() + 1);
    let (mut escaped, mut in_code, mut in_label, mut in_url, mut after_label) =
        (false, false, false, false, false);
    for ch in text.chars() {
        states.push(if escaped {
            CutState::Escape
        } else if in_code || in_label || in_url || after_label {
            CutState::Span
        } else {
            CutState::Clean
        });
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if in_code {
            in_code = ch != '`';
            continue;
        }
        if in_url {
            in_url = ch != ')';
            continue;
        }
        if in_label {
            if ch == ']' {
                in_label = false;
                after_label = true;
            }
            continue;
        }
        if after_label {
            after_label = false;
            if ch == '(' {
                in_url = true;
                continue;
            }
        }
        match ch {
            '`' => in_code = true,
            '[' => in_label = true,
            _ => {}
        }
    }
    states.push(if escaped {
        CutState::Escape
    } else {
        CutState::Clean
    });
    states
}

/// Pick the cut for a chunk starting at char `start` that may extend to `end`.
/// Returns the cut position and where the next chunk starts (both char indices).
fn choose_cut(
    text: &str,
    start: usize,
    end: usize,
    states: &[CutState],
    byte_at: &dyn Fn(usize) -> usize,
) -> (usize, usize) {
    for sep in ["\n\n", "\n", " "] {
        let found = (start + 1..=end)
            .rev()
            .find(|&i| states[i] == CutState::Clean && text[byte_at(i)..].starts_with(sep));
        if let Some(i) = found {
            return (i, i + sep.chars().count());
        }
    }
    let clean = (start + 1..=end).rev().find(|&i| states[i] == CutState::Clean);
    let fallback = clean
        .or_else(|| (start + 1..=end).rev().find(|&i| states[i] != CutState::Escape))
        .unwrap_or(end);
    (fallback, fallback)
}

/// Transport that keeps every message in memory. Handy for dry runs and tests.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, text: &str) -> Result<()> {
        tracing::info!(target: "transport", len = text.len(), "recorded message");
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
    }

    #[test]
    fn splits_on_block_boundaries_first() {
        let text = "aaaa\nbbbb\n\ncccc\ndddd\n\neeee";
        let parts = split_message(text, 12);
        assert_eq!(parts, vec!["aaaa\nbbbb", "cccc\ndddd", "eeee"]);
    }

    #[test]
    fn falls_back_to_words_then_chars() {
        let parts = split_message("one two three", 7);
        assert_eq!(parts, vec!["one two", "three"]);
        let parts = split_message("abcdefghij", 4);
        assert_eq!(parts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn limit_counts_utf16_units() {
        // Each emoji is two UTF-16 units.
        let ballot = "\u{1F5F3}".repeat(3);
        let text = format!("{ballot} {ballot}");
        let parts = split_message(&text, 6);
        assert_eq!(parts, vec![ballot.clone(), ballot]);
        assert!(parts.iter().all(|p| p.encode_utf16().count() <= 6));
    }

    #[test]
    fn escape_pairs_stay_together() {
        let parts = split_message("abcd\\.efgh", 5);
        assert_eq!(parts, vec!["abcd", "\\.efg", "h"]);
        for p in &parts {
            let trailing = p.chars().rev().take_while(|c| *c == '\\').count();
            assert_eq!(trailing % 2, 0, "dangling escape in {p:?}");
        }
    }

    #[test]
    fn code_spans_and_links_are_not_cut() {
        let parts = split_message("x `aaa bbb` y", 10);
        assert_eq!(parts, vec!["x", "`aaa bbb`", "y"]);

        let parts = split_message("see [a b](https://t.me/x y) now", 24);
        assert_eq!(parts, vec!["see", "[a b](https://t.me/x y)", "now"]);
    }

    #[test]
    fn every_chunk_fits_the_limit() {
        let text = "`one two three four` five \\. six ".repeat(20);
        for limit in [7, 16, 25, 40] {
            let parts = split_message(&text, limit);
            assert!(parts.iter().all(|p| p.encode_utf16().count() <= limit));
        }
    }
}
