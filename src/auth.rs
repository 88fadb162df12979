// src/auth.rs
//! OAuth2 client-credentials exchange (id + secret -> short-lived bearer token).
//! Used by the podcast catalogue and by app-only access to the social timeline.

use reqwest::Client;
use serde::Deserialize;

use crate::error::{DigestError, DigestResult};
use crate::http::fetch_json;

#[derive(Clone)]
pub struct ClientCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id_len", &self.client_id.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
}

impl ClientCredentials {
    /// Exchange the credentials for a bearer token. Called before each fetch;
    /// tokens are not kept between digest cycles.
    pub async fn issue_token(&self, client: &Client) -> DigestResult<String> {
        let req = client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")]);
        let resp: TokenResponse = fetch_json(req, "token exchange").await?;

        if let Some(kind) = resp.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                return Err(DigestError::fetch(format!(
                    "token exchange: unexpected token type {kind}"
                )));
            }
        }
        match resp.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(DigestError::fetch("token exchange: no access_token in response")),
        }
    }
}
