// src/sources/voting.rs
//! Governance proposals from the voting platform's GraphQL hub.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{DigestSource, Mode, SourceKind};
use crate::error::{DigestError, DigestResult};
use crate::http::fetch_text;
use crate::identity::{Identity, NameCache};
use crate::markdown::{code, escape, escape_code, escape_url, link, truncate_chars};
use crate::render::{format_utc, render_feed, FeedTemplate, Remaining, TEXT_BUDGET};

pub const DEFAULT_ENDPOINT: &str = "https://hub.snapshot.org/graphql";
pub const DEFAULT_SPACE: &str = "daocity.eth";

const PROPOSALS_QUERY: &str = r#"query Proposals($space: String!, $state: String!) {
  proposals(
    first: 100, skip: 0,
    where: { space_in: [$space], state: $state },
    orderBy: "created", orderDirection: desc
  ) { id title body choices start end snapshot state scores quorum author }
}"#;

const VOTES_QUERY: &str = r#"query Votes($proposal: String!) {
  votes(
    first: 1000, skip: 0,
    where: { proposal: $proposal },
    orderBy: "created", orderDirection: desc
  ) { id voter created choice proposal { id choices } }
}"#;

const SPACE_QUERY: &str = r#"query Space($space: String!) {
  space(id: $space) { id name about network symbol members }
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Active,
    Closed,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Active => "active",
            ProposalStatus::Closed => "closed",
        }
    }

    fn parse(s: &str) -> DigestResult<Self> {
        match s {
            "active" => Ok(ProposalStatus::Active),
            "closed" => Ok(ProposalStatus::Closed),
            other => Err(DigestError::integrity(format!(
                "unknown proposal state {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Proposal {
    pub id: String,
    pub title: String,
    pub body: String,
    pub choices: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ProposalStatus,
    pub author: Identity,
    pub quorum: f64,
    /// One entry per choice, in `choices` order.
    pub scores: Vec<(String, f64)>,
    pub url: String,
}

impl Proposal {
    pub fn total_score(&self) -> f64 {
        self.scores.iter().map(|(_, s)| s).sum()
    }

    /// `sum(scores) / quorum`; `None` when the proposal sets no quorum.
    pub fn quorum_reached(&self) -> Option<f64> {
        (self.quorum > 0.0).then(|| self.total_score() / self.quorum)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Remaining {
        Remaining::until(self.end, now)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub voter: Identity,
    pub created: DateTime<Utc>,
    pub choice: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub about: Option<String>,
    pub network: String,
    pub symbol: String,
    pub members: Vec<Identity>,
}

/// Map a 1-based choice index onto its label.
pub fn resolve_choice(choices: &[String], index: i64) -> DigestResult<String> {
    if index < 1 || index as usize > choices.len() {
        return Err(DigestError::integrity(format!(
            "vote choice {index} outside 1..={}",
            choices.len()
        )));
    }
    Ok(choices[index as usize - 1].clone())
}

// ---- wire shapes ----

#[derive(Deserialize)]
struct GraphqlEnvelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
struct RawProposal {
    id: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    choices: Vec<String>,
    start: i64,
    end: i64,
    state: String,
    author: String,
    #[serde(default)]
    quorum: Option<f64>,
    #[serde(default)]
    scores: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawVote {
    voter: String,
    created: i64,
    choice: Value,
    proposal: RawVoteProposal,
}

#[derive(Deserialize)]
struct RawVoteProposal {
    choices: Vec<String>,
}

#[derive(Deserialize)]
struct RawSpace {
    id: String,
    name: String,
    #[serde(default)]
    about: Option<String>,
    #[serde(default)]
    network: Value,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    members: Vec<String>,
}

fn unix(ts: i64, what: &str) -> DigestResult<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| DigestError::integrity(format!("{what} timestamp {ts} out of range")))
}

/// Unwrap a GraphQL response and take `data.<field>`.
fn take_field(body: &str, field: &str) -> DigestResult<Value> {
    let env: GraphqlEnvelope = serde_json::from_str(body)?;
    if let Some(first) = env.errors.first() {
        return Err(DigestError::fetch(format!("graphql: {}", first.message)));
    }
    let mut data = env
        .data
        .ok_or_else(|| DigestError::fetch("graphql: response has no data"))?;
    data.get_mut(field)
        .map(Value::take)
        .ok_or_else(|| DigestError::fetch(format!("graphql: data.{field} missing")))
}

fn proposal_from_raw(raw: RawProposal, space: &str) -> DigestResult<Proposal> {
    let scores = raw.scores.ok_or_else(|| {
        DigestError::integrity(format!("proposal {} carries no scores", raw.id))
    })?;
    if scores.len() != raw.choices.len() {
        return Err(DigestError::integrity(format!(
            "proposal {} has {} choices but {} scores",
            raw.id,
            raw.choices.len(),
            scores.len()
        )));
    }
    let scores = raw.choices.iter().cloned().zip(scores).collect();
    Ok(Proposal {
        url: format!("https://snapshot.org/#/{space}/proposal/{}", raw.id),
        start: unix(raw.start, "start")?,
        end: unix(raw.end, "end")?,
        status: ProposalStatus::parse(&raw.state)?,
        author: Identity::new(raw.author),
        quorum: raw.quorum.unwrap_or(0.0),
        body: raw.body.unwrap_or_default(),
        choices: raw.choices,
        title: raw.title,
        id: raw.id,
        scores,
    })
}

pub fn parse_proposals(body: &str, space: &str) -> DigestResult<Vec<Proposal>> {
    let raw: Vec<RawProposal> = serde_json::from_value(take_field(body, "proposals")?)?;
    raw.into_iter().map(|p| proposal_from_raw(p, space)).collect()
}

pub fn parse_votes(body: &str) -> DigestResult<Vec<Vote>> {
    let raw: Vec<RawVote> = serde_json::from_value(take_field(body, "votes")?)?;
    raw.into_iter()
        .map(|v| {
            let index = v.choice.as_i64().ok_or_else(|| {
                DigestError::integrity(format!("vote choice {} is not an index", v.choice))
            })?;
            Ok(Vote {
                choice: resolve_choice(&v.proposal.choices, index)?,
                created: unix(v.created, "vote")?,
                voter: Identity::new(v.voter),
            })
        })
        .collect()
}

pub fn parse_space(body: &str) -> DigestResult<Space> {
    let raw: RawSpace = serde_json::from_value(take_field(body, "space")?)?;
    let network = match raw.network {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Space {
        id: raw.id,
        name: raw.name,
        about: raw.about,
        network,
        symbol: raw.symbol,
        members: raw.members.into_iter().map(Identity::new).collect(),
    })
}

pub struct VotingHttp {
    endpoint: String,
    client: Client,
}

pub struct VotingSource {
    mode: Mode<VotingHttp>,
    space: String,
    community: String,
    names: Option<Arc<NameCache>>,
}

impl VotingSource {
    pub fn new(
        endpoint: impl Into<String>,
        space: impl Into<String>,
        community: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            mode: Mode::Http(VotingHttp {
                endpoint: endpoint.into(),
                client,
            }),
            space: space.into(),
            community: community.into(),
            names: None,
        }
    }

    /// Serve every query from one captured GraphQL response whose `data` may hold
    /// `proposals`, `votes` and `space` at once.
    pub fn from_fixture(body: &str, space: impl Into<String>, community: impl Into<String>) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
            space: space.into(),
            community: community.into(),
            names: None,
        }
    }

    /// Render authors through a shared name cache.
    pub fn with_names(mut self, names: Arc<NameCache>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn space_url(&self) -> String {
        format!("https://snapshot.org/#/{}", self.space)
    }

    async fn query(&self, query: &str, variables: Value, what: &str) -> DigestResult<String> {
        match &self.mode {
            Mode::Fixture(body) => Ok(body.clone()),
            Mode::Http(VotingHttp { endpoint, client }) => {
                let req = client
                    .post(endpoint)
                    .json(&json!({ "query": query, "variables": variables }));
                fetch_text(req, what).await
            }
        }
    }

    pub async fn fetch_proposals(&self, status: ProposalStatus) -> DigestResult<Vec<Proposal>> {
        let body = self
            .query(
                PROPOSALS_QUERY,
                json!({ "space": self.space, "state": status.as_str() }),
                "voting proposals",
            )
            .await?;
        let proposals: Vec<Proposal> = parse_proposals(&body, &self.space)?
            .into_iter()
            .filter(|p| p.status == status)
            .collect();
        debug!(target: "digest", count = proposals.len(), state = status.as_str(), "proposals fetched");
        Ok(proposals)
    }

    pub async fn fetch_active_proposals(&self) -> DigestResult<Vec<Proposal>> {
        self.fetch_proposals(ProposalStatus::Active).await
    }

    pub async fn fetch_votes(&self, proposal: &Proposal) -> DigestResult<Vec<Vote>> {
        let body = self
            .query(VOTES_QUERY, json!({ "proposal": proposal.id }), "voting votes")
            .await?;
        parse_votes(&body)
    }

    pub async fn fetch_space(&self) -> DigestResult<Space> {
        let body = self
            .query(SPACE_QUERY, json!({ "space": self.space }), "voting space")
            .await?;
        parse_space(&body)
    }

    pub fn render(&self, proposals: &[Proposal], now: DateTime<Utc>) -> String {
        let venue = link(&format!("{} Snapshot", self.community), &self.space_url());
        let tpl = FeedTemplate {
            header: None,
            empty: format!("🗳 There's no active proposal on {venue} right now\\."),
            count_line: format!(
                "🗳 {venue} have {} active proposal\\(s\\)\\!",
                proposals.len()
            ),
            overflow_header: String::new(),
            sign_off: format!(
                "📝 Be sure to vote if you're a {} Citizen\\!",
                escape(&self.community)
            ),
        };
        render_feed(&tpl, proposals, &[], 0, |p| proposal_block(p, now))
    }
}

fn proposal_block(p: &Proposal, now: DateTime<Utc>) -> String {
    let url = escape_url(&p.url);
    let scores = p
        .scores
        .iter()
        .map(|(choice, score)| format!("{}: {}", escape(choice), score.trunc() as i128))
        .collect::<Vec<_>>()
        .join("\t");
    let fraction = match p.quorum_reached() {
        Some(f) => format!("{:.1}%", f * 100.0),
        None => "n/a".to_string(),
    };
    let quorum = format!(
        "{} / {} ({fraction})",
        p.total_score().trunc() as i128,
        p.quorum.trunc() as i128
    );

    let mut out = String::new();
    out.push_str(&format!(
        "👉 [`{}`]({url})\n",
        escape_code(&truncate_chars(&p.title, TEXT_BUDGET))
    ));
    out.push_str(&format!("    📊 {scores}\n"));
    out.push_str(&format!("   🧿 Quorum: {}\n", escape(&quorum)));
    out.push_str(&format!("   ✍️ Author: {}\n", code(&p.author.short())));
    out.push_str(&format!(
        "   ⏰ Deadline: {}\n",
        escape(&format_utc(p.end))
    ));
    out.push_str(&format!(
        "           \\({} left\\!\\)\n",
        p.remaining(now)
    ));
    out.push_str(&format!("   🟢 Cast your vote [here]({url})\n"));
    out
}

#[async_trait]
impl DigestSource for VotingSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Proposals
    }

    async fn summarize(&self, now: DateTime<Utc>) -> DigestResult<String> {
        let mut proposals = self.fetch_active_proposals().await?;
        if let Some(names) = &self.names {
            for p in proposals.iter_mut() {
                p.author = names.resolve(&p.author.address).await;
            }
        }
        Ok(self.render(&proposals, now))
    }
}
