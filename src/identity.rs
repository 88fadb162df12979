// src/identity.rs
//! Chain identities and their memoized human-readable names.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// A chain address plus, once looked up, its readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub address: String,
    pub name: Option<String>,
}

impl Identity {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Resolved name if known, raw address otherwise.
    pub fn display(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }

    /// `0x1234…abcd` form for places where a full address is too wide.
    pub fn short(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let a = &self.address;
        if a.len() <= 12 || !a.is_ascii() {
            return a.clone();
        }
        format!("{}…{}", &a[..6], &a[a.len() - 4..])
    }
}

/// Reverse lookup of an address to a name.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// `Ok(None)` means the address has no name.
    async fn lookup(&self, address: &str) -> Result<Option<String>>;
}

/// Resolver backed by a JSON lookup endpoint: `GET {base}/{address}` -> `{"name": ...}`.
pub struct HttpNameResolver {
    base_url: String,
    client: Client,
}

impl HttpNameResolver {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    name: Option<String>,
}

#[async_trait]
impl NameResolver for HttpNameResolver {
    async fn lookup(&self, address: &str) -> Result<Option<String>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), address);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("name lookup request")?
            .error_for_status()
            .context("name lookup non-2xx")?;
        let body: LookupResponse = resp.json().await.context("name lookup body")?;
        Ok(body.name.filter(|n| !n.trim().is_empty()))
    }
}

/// Process-wide memo of address -> name. Filled on first lookup, never invalidated.
///
/// Lookup errors are not memoized, so a later cycle can retry; the caller falls
/// back to the raw address either way.
pub struct NameCache {
    resolver: Arc<dyn NameResolver>,
    names: RwLock<HashMap<String, Option<String>>>,
}

impl NameCache {
    pub fn new(resolver: Arc<dyn NameResolver>) -> Self {
        Self {
            resolver,
            names: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &str) -> Option<Option<String>> {
        self.names
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    /// Resolve `address`, never failing.
    pub async fn resolve(&self, address: &str) -> Identity {
        let key = address.to_ascii_lowercase();
        if let Some(name) = self.cached(&key) {
            return Identity {
                address: address.to_string(),
                name,
            };
        }

        match self.resolver.lookup(address).await {
            Ok(name) => {
                // Last write wins; resolution is deterministic per address.
                self.names
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(key, name.clone());
                Identity {
                    address: address.to_string(),
                    name,
                }
            }
            Err(e) => {
                tracing::debug!(target: "digest", %address, error = %e, "name lookup failed");
                Identity::new(address)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.names
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
