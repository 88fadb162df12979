// src/sources/podcast.rs
//! Latest podcast episodes from the catalogue API.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{DigestSource, Mode, SourceKind};
use crate::auth::ClientCredentials;
use crate::error::{DigestError, DigestResult};
use crate::http::fetch_text;
use crate::markdown::{escape, escape_code, escape_url, link, truncate_chars};
use crate::render::{format_duration, format_utc, render_feed, FeedTemplate, TEXT_BUDGET};
use crate::window::{date_as_utc, overflow_cap, partition, Timestamped};

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_SHOW_ID: &str = "4DqYWZyAMxUAL5o22caPSd";
pub const DEFAULT_MARKET: &str = "ES";
pub const DEFAULT_LIMIT: usize = 30;
pub const DEFAULT_TARGET_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub name: String,
    pub url: String,
    /// Day precision only; no time of day is published.
    pub release_date: NaiveDate,
    pub preview_url: Option<String>,
    pub description: String,
    pub duration_secs: f64,
}

/// Release dates are placed at midnight UTC, so the shared window admits only
/// episodes dated today (UTC). Kept as-is until day-boundary intent is confirmed.
impl Timestamped for Episode {
    fn timestamp(&self) -> DateTime<Utc> {
        date_as_utc(self.release_date)
    }
}

#[derive(Deserialize)]
struct EpisodePage {
    // The API occasionally returns `null` entries for unavailable episodes.
    items: Vec<Option<RawEpisode>>,
}

#[derive(Deserialize)]
struct RawEpisode {
    name: String,
    external_urls: ExternalUrls,
    release_date: String,
    #[serde(default)]
    release_date_precision: Option<String>,
    #[serde(default)]
    audio_preview_url: Option<String>,
    #[serde(default)]
    description: String,
    duration_ms: u64,
}

#[derive(Deserialize)]
struct ExternalUrls {
    spotify: String,
}

/// Parse `YYYY-MM-DD`; coarser precisions resolve to the first day of the period.
pub fn parse_release_date(s: &str, precision: Option<&str>) -> DigestResult<NaiveDate> {
    let padded = match precision {
        Some("year") => format!("{s}-01-01"),
        Some("month") => format!("{s}-01"),
        _ => s.to_string(),
    };
    NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .map_err(|e| DigestError::integrity(format!("release date {s:?}: {e}")))
}

pub fn parse_episodes(body: &str) -> DigestResult<Vec<Episode>> {
    let page: EpisodePage = serde_json::from_str(body)?;
    page.items
        .into_iter()
        .flatten()
        .map(|e| {
            Ok(Episode {
                release_date: parse_release_date(
                    &e.release_date,
                    e.release_date_precision.as_deref(),
                )?,
                name: e.name,
                url: e.external_urls.spotify,
                preview_url: e.audio_preview_url,
                description: e.description,
                duration_secs: e.duration_ms as f64 / 1000.0,
            })
        })
        .collect()
}

pub struct PodcastHttp {
    api_base: String,
    credentials: ClientCredentials,
    market: String,
    limit: usize,
    client: Client,
}

pub struct PodcastSource {
    mode: Mode<PodcastHttp>,
    show_id: String,
    community: String,
    target_count: usize,
}

impl PodcastSource {
    pub fn new(
        api_base: impl Into<String>,
        show_id: impl Into<String>,
        credentials: ClientCredentials,
        client: Client,
    ) -> Self {
        Self {
            mode: Mode::Http(PodcastHttp {
                api_base: api_base.into(),
                credentials,
                market: DEFAULT_MARKET.to_string(),
                limit: DEFAULT_LIMIT,
                client,
            }),
            show_id: show_id.into(),
            community: "CityDAO".to_string(),
            target_count: DEFAULT_TARGET_COUNT,
        }
    }

    pub fn from_fixture(body: &str, show_id: impl Into<String>) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
            show_id: show_id.into(),
            community: "CityDAO".to_string(),
            target_count: DEFAULT_TARGET_COUNT,
        }
    }

    pub fn with_market(mut self, market: impl Into<String>, limit: usize) -> Self {
        if let Mode::Http(http) = &mut self.mode {
            http.market = market.into();
            http.limit = limit;
        }
        self
    }

    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = community.into();
        self
    }

    pub fn with_target_count(mut self, n: usize) -> Self {
        self.target_count = n;
        self
    }

    pub fn show_url(&self) -> String {
        format!("https://open.spotify.com/show/{}", self.show_id)
    }

    /// Issues a fresh bearer token, then reads the show's latest episodes.
    pub async fn fetch_latest(&self) -> DigestResult<Vec<Episode>> {
        let body = match &self.mode {
            Mode::Fixture(body) => body.clone(),
            Mode::Http(http) => {
                let token = http.credentials.issue_token(&http.client).await?;
                let limit = http.limit.to_string();
                let req = http
                    .client
                    .get(format!(
                        "{}/v1/shows/{}/episodes",
                        http.api_base.trim_end_matches('/'),
                        self.show_id
                    ))
                    .bearer_auth(token)
                    .query(&[("market", http.market.as_str()), ("limit", limit.as_str())]);
                fetch_text(req, "podcast episodes").await?
            }
        };
        let episodes = parse_episodes(&body)?;
        debug!(target: "digest", count = episodes.len(), "episodes fetched");
        Ok(episodes)
    }

    pub fn render(&self, new: &[Episode], other: &[Episode], cap: usize) -> String {
        let podcast = format!("{} Podcast", self.community);
        let tpl = FeedTemplate {
            header: Some(format!(
                "📟 Here's latest {} on {}\\!",
                escape(&podcast),
                link("Spotify", &self.show_url())
            )),
            empty: format!("🥱 There's no new episode from {}\\. Stay Tuned\\!", escape(&podcast)),
            count_line: format!("🍻 There's {} new podcast episodes\\!", new.len()),
            overflow_header: format!(
                "Checkout other episodes from {}\\!",
                link(&podcast, &self.show_url())
            ),
            sign_off: "🎧 Happy listening Citizen\\!".to_string(),
        };
        render_feed(&tpl, new, other, cap, episode_block)
    }
}

fn episode_block(e: &Episode) -> String {
    let mut out = format!(
        "👉 `{}`\n    [Listen to full Episode here]({})\n",
        escape_code(&truncate_chars(&e.name, TEXT_BUDGET)),
        escape_url(&e.url)
    );
    let about = e.description.trim();
    if !about.is_empty() {
        out.push_str(&format!(
            "    📝 {}\n",
            escape(&truncate_chars(about, TEXT_BUDGET))
        ));
    }
    out.push_str(&format!(
        "    🎧 Duration: {}\n",
        escape(&format_duration(e.duration_secs))
    ));
    out.push_str(&format!(
        "    ⏰ Released on {}\n",
        escape(&format_utc(e.timestamp()))
    ));
    out
}

#[async_trait]
impl DigestSource for PodcastSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Podcast
    }

    async fn summarize(&self, now: DateTime<Utc>) -> DigestResult<String> {
        let episodes = self.fetch_latest().await?;
        let (new, other) = partition(episodes, now);
        let cap = overflow_cap(self.target_count, new.len());
        Ok(self.render(&new, &other, cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_release_dates_resolve_to_period_start() {
        assert_eq!(
            parse_release_date("2022-05", Some("month")).unwrap(),
            NaiveDate::from_ymd_opt(2022, 5, 1).unwrap()
        );
        assert_eq!(
            parse_release_date("2022", Some("year")).unwrap(),
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
        );
        assert!(parse_release_date("yesterday", None).is_err());
    }

    #[test]
    fn null_items_are_skipped() {
        let body = r#"{"items":[null,{"name":"Ep 1","external_urls":{"spotify":"https://open.spotify.com/episode/1"},
            "release_date":"2022-05-03","release_date_precision":"day","audio_preview_url":null,
            "description":"About parcels","duration_ms":3725500}]}"#;
        let eps = parse_episodes(body).unwrap();
        assert_eq!(eps.len(), 1);
        assert!((eps[0].duration_secs - 3725.5).abs() < 1e-9);
    }

    #[test]
    fn duration_is_escaped_in_block() {
        let e = Episode {
            name: "Ep".into(),
            url: "https://open.spotify.com/episode/1".into(),
            release_date: NaiveDate::from_ymd_opt(2022, 5, 3).unwrap(),
            preview_url: None,
            description: String::new(),
            duration_secs: 3725.5,
        };
        let block = episode_block(&e);
        assert!(block.contains(r"🎧 Duration: 1 hours 2 minutes 5\.50 seconds"));
        assert!(block.contains("Released on 03 May 2022 00:00:00 UTC"));
        assert!(!block.contains("📝"));
    }
}
