// src/render.rs
//! Shared digest renderer and the number/time formats every digest uses.
//!
//! All fixed template text handed to [`FeedTemplate`] must already be escaped for
//! the transport; item blocks escape their own dynamic fields.

use chrono::{DateTime, Utc};

/// Character budget for free-text fields (titles, post text, descriptions).
pub const TEXT_BUDGET: usize = 100;

pub const DIVIDER: &str = "—————————————————————————";

/// Fixed wording of one source's digest.
#[derive(Debug, Clone, Default)]
pub struct FeedTemplate {
    /// Opening line(s), shown whether or not there is anything new.
    pub header: Option<String>,
    /// Sentence used when there are no primary items. Rendering stops after it.
    pub empty: String,
    /// Line naming the number of primary items.
    pub count_line: String,
    /// Heading above the overflow section.
    pub overflow_header: String,
    pub sign_off: String,
}

/// Render `primary` items, then up to `overflow_cap` of `overflow`, one block per item.
///
/// With no primary items only the header and the empty sentence are produced;
/// overflow is dropped to keep the digest short.
pub fn render_feed<T>(
    tpl: &FeedTemplate,
    primary: &[T],
    overflow: &[T],
    overflow_cap: usize,
    block: impl Fn(&T) -> String,
) -> String {
    let mut out = String::new();
    if let Some(header) = &tpl.header {
        out.push_str(header);
        out.push_str("\n\n");
    }

    if primary.is_empty() {
        out.push_str(&tpl.empty);
        return out;
    }

    out.push_str(&tpl.count_line);
    out.push_str("\n\n");
    for item in primary {
        out.push_str(&block(item));
        out.push('\n');
    }

    let shown: Vec<&T> = overflow.iter().take(overflow_cap).collect();
    if !shown.is_empty() {
        out.push_str(DIVIDER);
        out.push_str("\n\n");
        out.push_str(&tpl.overflow_header);
        out.push_str("\n\n");
        for item in shown {
            out.push_str(&block(item));
            out.push('\n');
        }
    }

    out.push_str(&tpl.sign_off);
    out
}

/// `DD Mon YYYY HH:MM:SS UTC`
pub fn format_utc(ts: DateTime<Utc>) -> String {
    ts.format("%d %b %Y %H:%M:%S UTC").to_string()
}

/// `H hours M minutes S.SS seconds`, hour part omitted when zero. Unescaped.
pub fn format_duration(total_secs: f64) -> String {
    let total = total_secs.max(0.0);
    let hours = (total / 3600.0).floor();
    let minutes = ((total - hours * 3600.0) / 60.0).floor();
    let seconds = total - hours * 3600.0 - minutes * 60.0;
    if hours == 0.0 {
        format!("{} minutes {:.2} seconds", minutes as u64, seconds)
    } else {
        format!(
            "{} hours {} minutes {:.2} seconds",
            hours as u64, minutes as u64, seconds
        )
    }
}

/// Remaining time until a deadline, clamped at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl Remaining {
    pub fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let secs = (deadline - now).num_seconds().max(0);
        Self {
            days: secs / 86_400,
            hours: (secs % 86_400) / 3600,
            minutes: (secs % 3600) / 60,
        }
    }
}

impl std::fmt::Display for Remaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} days {} hours {} minutes",
            self.days, self.hours, self.minutes
        )
    }
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(n: u128) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
