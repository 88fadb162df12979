// src/transport/telegram.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{MessageTransport, DEFAULT_MESSAGE_LIMIT};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramTransport {
    token: String,
    chat_id: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    limit: usize,
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("token_len", &self.token.len())
            .finish()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramTransport {
    pub fn new(token: String, chat_id: String, client: Client) -> Self {
        Self {
            token,
            chat_id,
            api_base: DEFAULT_API_BASE.to_string(),
            client,
            timeout: Duration::from_secs(10),
            limit: DEFAULT_MESSAGE_LIMIT,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.token,
            method
        )
    }

    /// Send `text` (MarkdownV2) to an explicit chat.
    pub async fn send_to(&self, chat_id: &str, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: "MarkdownV2",
            disable_web_page_preview: true,
        };
        let rsp = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("telegram sendMessage request")?;
        let status = rsp.status();
        let parsed: ApiResponse<serde_json::Value> = rsp
            .json()
            .await
            .with_context(|| format!("telegram sendMessage body (HTTP {status})"))?;
        if !parsed.ok {
            return Err(anyhow!(
                "telegram sendMessage rejected: {}",
                parsed.description.unwrap_or_else(|| status.to_string())
            ));
        }
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, poll_secs: u64) -> Result<Vec<Update>> {
        let rsp = self
            .client
            .get(self.method_url("getUpdates"))
            .timeout(self.timeout + Duration::from_secs(poll_secs))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", poll_secs.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .send()
            .await
            .context("telegram getUpdates request")?;
        let parsed: ApiResponse<Vec<Update>> =
            rsp.json().await.context("telegram getUpdates body")?;
        if !parsed.ok {
            return Err(anyhow!(
                "telegram getUpdates rejected: {}",
                parsed.description.unwrap_or_default()
            ));
        }
        Ok(parsed.result.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl MessageTransport for TelegramTransport {
    async fn send(&self, text: &str) -> Result<()> {
        self.send_to(&self.chat_id, text).await
    }

    fn message_limit(&self) -> usize {
        self.limit
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
