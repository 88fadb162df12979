// src/http.rs
//! Outbound HTTP plumbing shared by every upstream client.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::{DigestError, DigestResult};

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Build the shared client. Every request made through it carries `timeout`,
/// and an elapsed timeout surfaces as [`DigestError::Fetch`].
pub fn build_client(timeout: Duration) -> DigestResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("dao-digest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| DigestError::config(format!("http client: {e}")))
}

/// Send `req`, require a 2xx answer, and decode the JSON body.
pub async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder, what: &str) -> DigestResult<T> {
    let body = fetch_text(req, what).await?;
    serde_json::from_str(&body)
        .map_err(|e| DigestError::fetch(format!("{what}: malformed response: {e}")))
}

/// Send `req` and return the body of a 2xx answer.
pub async fn fetch_text(req: RequestBuilder, what: &str) -> DigestResult<String> {
    let resp = req
        .send()
        .await
        .map_err(|e| DigestError::fetch(format!("{what}: {}", describe(&e))))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| DigestError::fetch(format!("{what}: reading body: {e}")))?;
    if !status.is_success() {
        let snippet: String = body.chars().take(200).collect();
        return Err(DigestError::fetch(format!("{what}: HTTP {status}: {snippet}")));
    }
    Ok(body)
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    }
}
