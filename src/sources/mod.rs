// src/sources/mod.rs
//! One digest source per upstream: fetch, window, format.

pub mod calendar;
pub mod podcast;
pub mod social;
pub mod treasury;
pub mod voting;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DigestResult;

/// The upstream a digest summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[serde(alias = "votes")]
    Proposals,
    #[serde(alias = "social")]
    Tweets,
    #[serde(alias = "spotify")]
    Podcast,
    Calendar,
    Treasury,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Proposals,
        SourceKind::Tweets,
        SourceKind::Podcast,
        SourceKind::Calendar,
        SourceKind::Treasury,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Proposals => "proposals",
            SourceKind::Tweets => "tweets",
            SourceKind::Podcast => "podcast",
            SourceKind::Calendar => "calendar",
            SourceKind::Treasury => "treasury",
        }
    }

    /// Chat command names answering with this source's digest.
    pub fn commands(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Proposals => &["proposals"],
            SourceKind::Tweets => &["tweets"],
            SourceKind::Podcast => &["spotify", "podcast"],
            SourceKind::Calendar => &["calendar"],
            SourceKind::Treasury => &["treasury"],
        }
    }

    pub fn from_command(cmd: &str) -> Option<Self> {
        let cmd = cmd.trim().trim_start_matches('/').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.commands().iter().any(|c| *c == cmd))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proposals" | "votes" => Ok(SourceKind::Proposals),
            "tweets" | "social" => Ok(SourceKind::Tweets),
            "podcast" | "spotify" => Ok(SourceKind::Podcast),
            "calendar" => Ok(SourceKind::Calendar),
            "treasury" => Ok(SourceKind::Treasury),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// A configured upstream able to produce one digest per call.
#[async_trait]
pub trait DigestSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch, select and render. `now` anchors every time comparison.
    async fn summarize(&self, now: DateTime<Utc>) -> DigestResult<String>;
}

/// Where a source reads its upstream response from.
///
/// `Fixture` holds a captured response body and skips the network entirely.
pub(crate) enum Mode<H> {
    Fixture(String),
    Http(H),
}
