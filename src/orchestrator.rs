// src/orchestrator.rs
//! Holds the configured sources and runs digest cycles against a transport.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::auth::ClientCredentials;
use crate::chain::JsonRpcReader;
use crate::config::AppConfig;
use crate::error::{DigestError, DigestResult};
use crate::identity::{HttpNameResolver, NameCache};
use crate::metrics::ensure_metrics_described;
use crate::sources::calendar::CalendarSource;
use crate::sources::podcast::PodcastSource;
use crate::sources::social::SocialSource;
use crate::sources::treasury::TreasurySource;
use crate::sources::voting::VotingSource;
use crate::sources::{DigestSource, SourceKind};
use crate::transport::{split_message, MessageTransport};

/// Outcome of one broadcast cycle, in send order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BroadcastReport {
    pub sent: Vec<SourceKind>,
    /// Digest rendered empty.
    pub skipped: Vec<SourceKind>,
    /// Build or delivery failed; carries the error text.
    pub failed: Vec<(SourceKind, String)>,
}

#[derive(Default)]
pub struct Orchestrator {
    sources: BTreeMap<SourceKind, Arc<dyn DigestSource>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under its own kind, replacing any previous one.
    pub fn with_source(mut self, source: Arc<dyn DigestSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    /// Build every source that has a section in `cfg`, sharing one HTTP client
    /// and (when `[identity]` is present) one name cache.
    pub fn from_config(cfg: &AppConfig, client: Client) -> DigestResult<Self> {
        let names = cfg.identity.as_ref().map(|id| {
            Arc::new(NameCache::new(Arc::new(HttpNameResolver::new(
                id.resolver_url.clone(),
                client.clone(),
            ))))
        });

        let mut orch = Self::new();

        if let Some(v) = &cfg.voting {
            let mut src = VotingSource::new(&v.endpoint, &v.space, &cfg.community, client.clone());
            if let Some(names) = &names {
                src = src.with_names(names.clone());
            }
            orch = orch.with_source(Arc::new(src));
        }

        if let Some(s) = &cfg.social {
            let creds = ClientCredentials {
                token_url: s.token_url.clone(),
                client_id: s.api_key.clone(),
                client_secret: s.api_secret.clone(),
            };
            let src = SocialSource::new(&s.api_base, &s.account, creds, client.clone())
                .with_platform(&s.platform)
                .with_target_count(s.target_count);
            orch = orch.with_source(Arc::new(src));
        }

        if let Some(p) = &cfg.podcast {
            let creds = ClientCredentials {
                token_url: p.token_url.clone(),
                client_id: p.client_id.clone(),
                client_secret: p.client_secret.clone(),
            };
            let src = PodcastSource::new(&p.api_base, &p.show_id, creds, client.clone())
                .with_market(&p.market, p.limit)
                .with_community(&cfg.community)
                .with_target_count(p.target_count);
            orch = orch.with_source(Arc::new(src));
        }

        if let Some(c) = &cfg.calendar {
            let src = CalendarSource::new(&c.api_base, &c.calendar_id, &c.api_key, client.clone())
                .with_community(&cfg.community);
            orch = orch.with_source(Arc::new(src));
        }

        if let Some(t) = &cfg.treasury {
            let reader = Arc::new(JsonRpcReader::new(&t.rpc_url, client.clone()));
            let mut src = TreasurySource::new(reader, &t.wallet, t.tokens.clone())
                .with_native_symbol(&t.native_symbol)
                .with_community(&cfg.community);
            if let Some(names) = &names {
                src = src.with_names(names.clone());
            }
            orch = orch.with_source(Arc::new(src));
        }

        orch.ensure_configured(&cfg.schedule.order)?;
        info!(
            target: "digest",
            sources = ?orch.configured(),
            "orchestrator ready"
        );
        Ok(orch)
    }

    pub fn configured(&self) -> Vec<SourceKind> {
        self.sources.keys().copied().collect()
    }

    pub fn is_configured(&self, kind: SourceKind) -> bool {
        self.sources.contains_key(&kind)
    }

    /// Every entry of `order` must name a registered source.
    pub fn ensure_configured(&self, order: &[SourceKind]) -> DigestResult<()> {
        let missing: Vec<&str> = order
            .iter()
            .filter(|k| !self.is_configured(**k))
            .map(|k| k.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DigestError::config(format!(
                "schedule names unconfigured source(s): {}",
                missing.join(", ")
            )))
        }
    }

    pub async fn get_digest(&self, kind: SourceKind) -> DigestResult<String> {
        self.get_digest_at(kind, Utc::now()).await
    }

    /// Build one digest as of `now`. An unregistered source is a configuration defect.
    pub async fn get_digest_at(&self, kind: SourceKind, now: DateTime<Utc>) -> DigestResult<String> {
        ensure_metrics_described();
        let Some(source) = self.sources.get(&kind) else {
            error!(target: "digest", source = %kind, "digest requested for unconfigured source");
            return Err(DigestError::config(format!("source {kind} is not configured")));
        };

        let t0 = Instant::now();
        let result = source.summarize(now).await;
        histogram!("digest_fetch_ms", "source" => kind.as_str())
            .record(t0.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(text) => {
                counter!("digest_built_total", "source" => kind.as_str()).increment(1);
                debug!(target: "digest", source = %kind, len = text.len(), "digest built");
            }
            Err(e) => {
                counter!("digest_failed_total", "source" => kind.as_str()).increment(1);
                warn!(target: "digest", source = %kind, kind = e.kind(), error = %e, "digest failed");
            }
        }
        result
    }

    pub async fn broadcast_all(
        &self,
        order: &[SourceKind],
        transport: &dyn MessageTransport,
    ) -> BroadcastReport {
        self.broadcast_all_at(order, transport, Utc::now()).await
    }

    /// Build and send each digest strictly in `order`. A failure of one source
    /// (build or send) is recorded and the cycle moves on to the next.
    pub async fn broadcast_all_at(
        &self,
        order: &[SourceKind],
        transport: &dyn MessageTransport,
        now: DateTime<Utc>,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for &kind in order {
            let text = match self.get_digest_at(kind, now).await {
                Ok(text) => text,
                Err(e) => {
                    report.failed.push((kind, e.to_string()));
                    continue;
                }
            };
            if text.trim().is_empty() {
                counter!("digest_skipped_total", "source" => kind.as_str()).increment(1);
                info!(target: "digest", source = %kind, "empty digest skipped");
                report.skipped.push(kind);
                continue;
            }

            match send_split(transport, &text).await {
                Ok(parts) => {
                    counter!("digest_sent_total", "source" => kind.as_str()).increment(1);
                    info!(
                        target: "transport",
                        source = %kind,
                        transport = transport.name(),
                        parts,
                        "digest sent"
                    );
                    report.sent.push(kind);
                }
                Err(e) => {
                    counter!("digest_failed_total", "source" => kind.as_str()).increment(1);
                    warn!(
                        target: "transport",
                        source = %kind,
                        transport = transport.name(),
                        error = %e,
                        "digest delivery failed"
                    );
                    report.failed.push((kind, format!("{e:#}")));
                }
            }
        }

        gauge!("digest_broadcast_last_run_ts").set(now.timestamp() as f64);
        info!(
            target: "digest",
            sent = report.sent.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "broadcast finished"
        );
        report
    }
}

async fn send_split(transport: &dyn MessageTransport, text: &str) -> anyhow::Result<usize> {
    let parts = split_message(text, transport.message_limit());
    for part in &parts {
        transport.send(part).await?;
    }
    Ok(parts.len())
}
