// src/config.rs
//! Application configuration: one optional section per source, secrets from env.
//!
//! A secret written as `"ENV"` (the default for every secret) is read from its
//! environment variable at load time. A section that is present but whose secrets
//! cannot be resolved fails the load, so a half-configured source never starts.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::Deserialize;

use crate::citizen;
use crate::error::{DigestError, DigestResult};
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::sources::{calendar, podcast, social, treasury, voting, SourceKind};
use crate::transport::{telegram, DEFAULT_MESSAGE_LIMIT};

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";

const ENV_MARKER: &str = "ENV";

fn env_marker() -> String {
    ENV_MARKER.to_string()
}
fn default_community() -> String {
    "CityDAO".to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_daily_at() -> String {
    "09:00".to_string()
}
fn default_order() -> Vec<SourceKind> {
    vec![
        SourceKind::Tweets,
        SourceKind::Podcast,
        SourceKind::Treasury,
        SourceKind::Calendar,
        SourceKind::Proposals,
    ]
}
fn default_true() -> bool {
    true
}
fn default_message_limit() -> usize {
    DEFAULT_MESSAGE_LIMIT
}
fn default_poll_timeout_secs() -> u64 {
    30
}
fn default_telegram_base() -> String {
    telegram::DEFAULT_API_BASE.to_string()
}
fn default_voting_endpoint() -> String {
    voting::DEFAULT_ENDPOINT.to_string()
}
fn default_space() -> String {
    voting::DEFAULT_SPACE.to_string()
}
fn default_social_base() -> String {
    social::DEFAULT_API_BASE.to_string()
}
fn default_social_token_url() -> String {
    format!("{}/oauth2/token", social::DEFAULT_API_BASE)
}
fn default_account() -> String {
    social::DEFAULT_ACCOUNT.to_string()
}
fn default_platform() -> String {
    social::DEFAULT_PLATFORM.to_string()
}
fn default_target_count() -> usize {
    3
}
fn default_podcast_base() -> String {
    podcast::DEFAULT_API_BASE.to_string()
}
fn default_podcast_token_url() -> String {
    podcast::DEFAULT_TOKEN_URL.to_string()
}
fn default_show_id() -> String {
    podcast::DEFAULT_SHOW_ID.to_string()
}
fn default_market() -> String {
    podcast::DEFAULT_MARKET.to_string()
}
fn default_episode_limit() -> usize {
    podcast::DEFAULT_LIMIT
}
fn default_calendar_base() -> String {
    calendar::DEFAULT_API_BASE.to_string()
}
fn default_calendar_id() -> String {
    calendar::DEFAULT_CALENDAR_ID.to_string()
}
fn default_rpc_url() -> String {
    treasury::DEFAULT_RPC_URL.to_string()
}
fn default_wallet() -> String {
    treasury::DEFAULT_WALLET.to_string()
}
fn default_native_symbol() -> String {
    treasury::DEFAULT_NATIVE_SYMBOL.to_string()
}
fn default_tokens() -> Vec<String> {
    vec![treasury::WETH.to_string(), treasury::USDC.to_string()]
}
fn default_citizen_contract() -> String {
    citizen::CITIZEN_NFT.to_string()
}
fn default_marketplace_base() -> String {
    citizen::DEFAULT_MARKETPLACE_BASE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Community name used in digest wording.
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub telegram: Option<TelegramConfig>,
    pub voting: Option<VotingConfig>,
    pub social: Option<SocialConfig>,
    pub podcast: Option<PodcastConfig>,
    pub calendar: Option<CalendarConfig>,
    pub treasury: Option<TreasuryConfig>,
    pub identity: Option<IdentityConfig>,
    pub citizen: Option<CitizenConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `HH:MM`, UTC.
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
    #[serde(default = "default_order")]
    pub order: Vec<SourceKind>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_at: default_daily_at(),
            order: default_order(),
        }
    }
}

impl ScheduleConfig {
    pub fn daily_time(&self) -> DigestResult<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M").map_err(|e| {
            DigestError::config(format!("[schedule] daily_at {:?}: {e}", self.daily_at))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "env_marker")]
    pub token: String,
    #[serde(default = "env_marker")]
    pub chat_id: String,
    #[serde(default = "default_telegram_base")]
    pub api_base: String,
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Answer chat commands by long polling.
    #[serde(default = "default_true")]
    pub commands: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VotingConfig {
    #[serde(default = "default_voting_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_space")]
    pub space: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    #[serde(default = "default_social_base")]
    pub api_base: String,
    #[serde(default = "default_social_token_url")]
    pub token_url: String,
    #[serde(default = "default_account")]
    pub account: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "env_marker")]
    pub api_key: String,
    #[serde(default = "env_marker")]
    pub api_secret: String,
    #[serde(default = "default_target_count")]
    pub target_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodcastConfig {
    #[serde(default = "default_podcast_base")]
    pub api_base: String,
    #[serde(default = "default_podcast_token_url")]
    pub token_url: String,
    #[serde(default = "default_show_id")]
    pub show_id: String,
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_episode_limit")]
    pub limit: usize,
    #[serde(default = "env_marker")]
    pub client_id: String,
    #[serde(default = "env_marker")]
    pub client_secret: String,
    #[serde(default = "default_target_count")]
    pub target_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_base")]
    pub api_base: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "env_marker")]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreasuryConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_wallet")]
    pub wallet: String,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    #[serde(default = "default_tokens")]
    pub tokens: Vec<String>,
}

/// Citizen NFT reads. Not a digest source; served on `/citizens`.
#[derive(Debug, Clone, Deserialize)]
pub struct CitizenConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_citizen_contract")]
    pub contract: String,
    #[serde(default = "default_marketplace_base")]
    pub marketplace_base: String,
    /// Marketplace key for the holders lookup; `"ENV"` reads `OPENSEA_APIKEY`.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// `GET {resolver_url}/{address}` must answer `{"name": "..."}`.
    pub resolver_url: String,
}

/// Replace an `"ENV"` marker with the value of `var`; reject empty results.
fn resolve_secret(
    value: &mut String,
    var: &str,
    section: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> DigestResult<()> {
    if value.trim().eq_ignore_ascii_case(ENV_MARKER) {
        *value = lookup(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                DigestError::config(format!("[{section}] needs {var} in the environment"))
            })?;
    }
    if value.trim().is_empty() {
        return Err(DigestError::config(format!("[{section}] {var} is empty")));
    }
    Ok(())
}

impl AppConfig {
    /// Parse TOML (or JSON, by extension) without touching the environment.
    pub fn parse(content: &str, hint_ext: &str) -> DigestResult<Self> {
        if hint_ext.eq_ignore_ascii_case("json") {
            return serde_json::from_str(content)
                .map_err(|e| DigestError::config(format!("config json: {e}")));
        }
        toml::from_str(content).map_err(|e| DigestError::config(format!("config toml: {e}")))
    }

    /// Resolve every `"ENV"` secret of the sections that are present.
    pub fn resolve_secrets(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> DigestResult<()> {
        if let Some(t) = self.telegram.as_mut() {
            resolve_secret(&mut t.token, "TELEGRAM_TOKEN", "telegram", lookup)?;
            resolve_secret(&mut t.chat_id, "TELEGRAM_CHAT_ID", "telegram", lookup)?;
        }
        if let Some(s) = self.social.as_mut() {
            resolve_secret(&mut s.api_key, "TWITTER_APIKEY", "social", lookup)?;
            resolve_secret(&mut s.api_secret, "TWITTER_API_SECRET", "social", lookup)?;
        }
        if let Some(p) = self.podcast.as_mut() {
            resolve_secret(&mut p.client_id, "SPOTIFY_CLIENT_ID", "podcast", lookup)?;
            resolve_secret(
                &mut p.client_secret,
                "SPOTIFY_CLIENT_CREDENTIALS",
                "podcast",
                lookup,
            )?;
        }
        if let Some(c) = self.calendar.as_mut() {
            resolve_secret(&mut c.api_key, "GOOGLE_APIKEY", "calendar", lookup)?;
        }
        if let Some(key) = self.citizen.as_mut().and_then(|c| c.api_key.as_mut()) {
            resolve_secret(key, "OPENSEA_APIKEY", "citizen", lookup)?;
        }
        Ok(())
    }

    /// Sources with a section in this config.
    pub fn configured_sources(&self) -> Vec<SourceKind> {
        let mut out = Vec::new();
        if self.voting.is_some() {
            out.push(SourceKind::Proposals);
        }
        if self.social.is_some() {
            out.push(SourceKind::Tweets);
        }
        if self.podcast.is_some() {
            out.push(SourceKind::Podcast);
        }
        if self.calendar.is_some() {
            out.push(SourceKind::Calendar);
        }
        if self.treasury.is_some() {
            out.push(SourceKind::Treasury);
        }
        out
    }

    /// Load from an explicit path and resolve secrets from the process environment.
    pub fn load_from(path: &Path) -> DigestResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DigestError::config(format!("reading config from {}: {e}", path.display()))
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = Self::parse(&content, &ext)?;
        cfg.resolve_secrets(&|var| std::env::var(var).ok())?;
        cfg.schedule.daily_time()?;
        Ok(cfg)
    }

    /// Load using env var + fallback:
    /// 1) $DIGEST_CONFIG_PATH
    /// 2) config/digest.toml
    pub fn load_default() -> DigestResult<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(DigestError::config(format!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                )));
            }
            return Self::load_from(&pb);
        }
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }
}
