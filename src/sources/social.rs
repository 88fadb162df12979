// src/sources/social.rs
//! Recent original posts from the community's social timeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{DigestSource, Mode, SourceKind};
use crate::auth::ClientCredentials;
use crate::error::{DigestError, DigestResult};
use crate::http::fetch_text;
use crate::markdown::{escape, escape_code, escape_url, link, truncate_chars};
use crate::render::{format_utc, render_feed, FeedTemplate, TEXT_BUDGET};
use crate::window::{overflow_cap, partition, Timestamped};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";
pub const DEFAULT_PLATFORM: &str = "twitter.com";
pub const DEFAULT_ACCOUNT: &str = "CityDAO";
pub const TIMELINE_LIMIT: usize = 200;
pub const DEFAULT_TARGET_COUNT: usize = 3;

/// Timeline timestamp layout, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Clone, PartialEq)]
pub struct SocialPost {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub favorite_count: u64,
    pub share_count: u64,
    pub url: String,
}

impl Timestamped for SocialPost {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

pub fn permalink(platform: &str, account: &str, id: &str) -> String {
    format!("https://{platform}/{account}/status/{id}")
}

#[derive(Deserialize)]
struct RawPost {
    id_str: String,
    #[serde(alias = "full_text")]
    text: String,
    created_at: String,
    #[serde(default)]
    favorite_count: u64,
    #[serde(default)]
    retweet_count: u64,
}

pub fn parse_created_at(s: &str) -> DigestResult<DateTime<Utc>> {
    DateTime::parse_from_str(s, CREATED_AT_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DigestError::integrity(format!("post timestamp {s:?}: {e}")))
}

/// Parse a timeline response (a JSON array of posts).
pub fn parse_timeline(body: &str, platform: &str, account: &str) -> DigestResult<Vec<SocialPost>> {
    let raw: Vec<RawPost> = serde_json::from_str(body)?;
    raw.into_iter()
        .take(TIMELINE_LIMIT)
        .map(|p| {
            Ok(SocialPost {
                url: permalink(platform, account, &p.id_str),
                created_at: parse_created_at(&p.created_at)?,
                text: html_escape::decode_html_entities(&p.text).into_owned(),
                favorite_count: p.favorite_count,
                share_count: p.retweet_count,
                id: p.id_str,
            })
        })
        .collect()
}

pub struct SocialHttp {
    api_base: String,
    credentials: ClientCredentials,
    client: Client,
}

pub struct SocialSource {
    mode: Mode<SocialHttp>,
    platform: String,
    account: String,
    target_count: usize,
}

impl SocialSource {
    pub fn new(
        api_base: impl Into<String>,
        account: impl Into<String>,
        credentials: ClientCredentials,
        client: Client,
    ) -> Self {
        Self {
            mode: Mode::Http(SocialHttp {
                api_base: api_base.into(),
                credentials,
                client,
            }),
            platform: DEFAULT_PLATFORM.to_string(),
            account: account.into(),
            target_count: DEFAULT_TARGET_COUNT,
        }
    }

    pub fn from_fixture(body: &str, account: impl Into<String>) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
            platform: DEFAULT_PLATFORM.to_string(),
            account: account.into(),
            target_count: DEFAULT_TARGET_COUNT,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_target_count(mut self, n: usize) -> Self {
        self.target_count = n;
        self
    }

    pub fn account_url(&self) -> String {
        format!("https://{}/{}", self.platform, self.account.to_ascii_lowercase())
    }

    /// Up to 200 most recent original posts, newest first; shares and replies
    /// are excluded by the query itself.
    pub async fn fetch_recent(&self) -> DigestResult<Vec<SocialPost>> {
        let body = match &self.mode {
            Mode::Fixture(body) => body.clone(),
            Mode::Http(SocialHttp {
                api_base,
                credentials,
                client,
            }) => {
                let token = credentials.issue_token(client).await?;
                let count = TIMELINE_LIMIT.to_string();
                let req = client
                    .get(format!(
                        "{}/1.1/statuses/user_timeline.json",
                        api_base.trim_end_matches('/')
                    ))
                    .bearer_auth(token)
                    .query(&[
                        ("screen_name", self.account.as_str()),
                        ("include_rts", "false"),
                        ("exclude_replies", "true"),
                        ("tweet_mode", "extended"),
                        ("count", count.as_str()),
                    ]);
                fetch_text(req, "social timeline").await?
            }
        };
        let posts = parse_timeline(&body, &self.platform, &self.account)?;
        debug!(target: "digest", count = posts.len(), "timeline fetched");
        Ok(posts)
    }

    pub fn render(&self, today: &[SocialPost], other: &[SocialPost], cap: usize) -> String {
        let handle = link(&format!("@{}", self.account), &self.account_url());
        let tpl = FeedTemplate {
            header: Some(format!(
                "🌆 Here's latest {} tweets \\({handle}\\)",
                escape(&self.account)
            )),
            empty: format!("🥱 There's no new tweets from {handle}\\!"),
            count_line: format!("🎏 There's {} Tweets\\!", today.len()),
            overflow_header: format!("Checkout other tweets from {handle}\\!"),
            sign_off: "🟩 Have a great day Citizen\\! 🟩".to_string(),
        };
        render_feed(&tpl, today, other, cap, post_block)
    }
}

fn post_block(post: &SocialPost) -> String {
    format!(
        "👉 `{}`\n   [Read full tweet here]({})\n   💚 {:03}\t🔁 {:03}\n   ⏰ Tweeted on: {}\n",
        escape_code(&truncate_chars(&post.text, TEXT_BUDGET)),
        escape_url(&post.url),
        post.favorite_count,
        post.share_count,
        escape(&format_utc(post.created_at)),
    )
}

#[async_trait]
impl DigestSource for SocialSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Tweets
    }

    async fn summarize(&self, now: DateTime<Utc>) -> DigestResult<String> {
        let posts = self.fetch_recent().await?;
        let (today, other) = partition(posts, now);
        let cap = overflow_cap(self.target_count, today.len());
        Ok(self.render(&today, &other, cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn created_at_parses_to_utc() {
        let ts = parse_created_at("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap());
        let shifted = parse_created_at("Wed Oct 10 22:19:24 +0200 2018").unwrap();
        assert_eq!(shifted, ts);
    }

    #[test]
    fn entities_are_decoded_and_permalink_built() {
        let body = r#"[{"id_str":"42","full_text":"Parcel 0 &amp; more","created_at":"Wed Oct 10 20:19:24 +0000 2018","favorite_count":7,"retweet_count":3}]"#;
        let posts = parse_timeline(body, "twitter.com", "CityDAO").unwrap();
        assert_eq!(posts[0].text, "Parcel 0 & more");
        assert_eq!(posts[0].url, "https://twitter.com/CityDAO/status/42");
    }

    #[test]
    fn engagement_counters_are_zero_padded() {
        let post = SocialPost {
            id: "1".into(),
            text: "hello".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            favorite_count: 7,
            share_count: 12,
            url: "https://twitter.com/CityDAO/status/1".into(),
        };
        let block = post_block(&post);
        assert!(block.contains("💚 007\t🔁 012"));
        assert!(block.contains(r"02 Jan 2024 03:04:05 UTC"));
    }
}
