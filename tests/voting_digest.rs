// tests/voting_digest.rs
//
// Voting digest end to end from a captured GraphQL response (offline mode).
//
// Covered:
// - 4 active proposals, 2 below and 2 above quorum -> 4 blocks with quorum fractions
// - deadline in the past clamps to "0 days 0 hours 0 minutes"
// - votes resolve their 1-based choice index; space info
// - scores/choices mismatch and choice 0 surface as DataIntegrity
// - authors rendered through the name cache

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use dao_digest::identity::{NameCache, NameResolver};
use dao_digest::sources::voting::{parse_proposals, parse_votes, VotingSource};
use dao_digest::{DigestError, DigestSource};

const SNAPSHOT: &str = include_str!("fixtures/snapshot.json");

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap()
}

fn source() -> VotingSource {
    VotingSource::from_fixture(SNAPSHOT, "daocity.eth", "CityDAO")
}

#[tokio::test]
async fn four_proposals_render_four_blocks_with_quorum() {
    let text = source().summarize(now()).await.expect("voting digest");

    assert_eq!(text.matches("👉 ").count(), 4, "one block per proposal:\n{text}");
    assert!(text.contains("have 4 active proposal\\(s\\)\\!"));
    // below quorum
    assert!(text.contains("400 / 1000 \\(40\\.0%\\)"), "{text}");
    assert!(text.contains("900 / 1000 \\(90\\.0%\\)"), "{text}");
    // above quorum
    assert!(text.contains("1500 / 1000 \\(150\\.0%\\)"), "{text}");
    assert!(text.contains("2000 / 1000 \\(200\\.0%\\)"), "{text}");
    assert!(text.ends_with("📝 Be sure to vote if you're a CityDAO Citizen\\!"));
}

#[tokio::test]
async fn remaining_time_never_goes_negative() {
    let text = source().summarize(now()).await.expect("voting digest");

    assert!(text.contains("\\(0 days 0 hours 0 minutes left\\!\\)"), "{text}");
    assert!(text.contains("\\(2 days 3 hours 5 minutes left\\!\\)"));
    assert!(text.contains("\\(0 days 1 hours 0 minutes left\\!\\)"));
    assert!(text.contains("\\(5 days 0 hours 0 minutes left\\!\\)"));
    assert!(!text.contains("\\-1 days"));
}

#[tokio::test]
async fn scores_are_paired_with_choices_in_order() {
    let proposals = source().fetch_active_proposals().await.expect("proposals");
    assert_eq!(proposals.len(), 4);
    let council = &proposals[2];
    assert_eq!(
        council.scores,
        vec![
            ("Alice".to_string(), 800.0),
            ("Bob".to_string(), 400.0),
            ("Carol".to_string(), 300.0)
        ]
    );
    assert_eq!(council.url, "https://snapshot.org/#/daocity.eth/proposal/0xa3");
    assert_eq!(council.quorum_reached(), Some(1.5));
}

#[tokio::test]
async fn votes_and_space_come_from_the_same_venue() {
    let src = source();
    let proposals = src.fetch_active_proposals().await.expect("proposals");
    let votes = src.fetch_votes(&proposals[0]).await.expect("votes");
    let choices: Vec<&str> = votes.iter().map(|v| v.choice.as_str()).collect();
    assert_eq!(choices, vec!["Against", "For"]);

    let space = src.fetch_space().await.expect("space");
    assert_eq!(space.name, "CityDAO");
    assert_eq!(space.network, "1");
    assert_eq!(space.members.len(), 2);
}

#[test]
fn scores_choices_mismatch_is_integrity_error() {
    let body = r#"{"data":{"proposals":[{"id":"0xbad","title":"t","choices":["A","B","C"],
        "start":0,"end":1,"state":"active","scores":[1,2],"quorum":0,"author":"0x1"}]}}"#;
    let err = parse_proposals(body, "daocity.eth").unwrap_err();
    assert!(matches!(err, DigestError::DataIntegrity(_)), "{err}");
}

#[test]
fn zero_or_out_of_range_vote_choice_is_integrity_error() {
    for choice in [0, 4] {
        let body = format!(
            r#"{{"data":{{"votes":[{{"voter":"0x1","created":0,"choice":{choice},
                "proposal":{{"choices":["A","B","C"]}}}}]}}}}"#
        );
        let err = parse_votes(&body).unwrap_err();
        assert!(matches!(err, DigestError::DataIntegrity(_)), "choice {choice}: {err}");
    }
}

#[test]
fn graphql_errors_are_fetch_errors() {
    let err = parse_proposals(r#"{"errors":[{"message":"rate limited"}]}"#, "x").unwrap_err();
    assert!(matches!(err, DigestError::Fetch(_)));
}

struct Directory(HashMap<String, String>);

#[async_trait]
impl NameResolver for Directory {
    async fn lookup(&self, address: &str) -> anyhow::Result<Option<String>> {
        Ok(self.0.get(&address.to_ascii_lowercase()).cloned())
    }
}

#[tokio::test]
async fn authors_use_resolved_names() {
    let dir = Directory(HashMap::from([(
        "0x1111111111111111111111111111111111111111".to_string(),
        "alice.eth".to_string(),
    )]));
    let names = Arc::new(NameCache::new(Arc::new(dir)));
    let text = source()
        .with_names(names.clone())
        .summarize(now())
        .await
        .expect("voting digest");

    assert!(text.contains("✍️ Author: `alice.eth`"), "{text}");
    assert!(text.contains("✍️ Author: `0x2222…2222`"));
    assert_eq!(names.len(), 4);
}

#[tokio::test]
async fn no_active_proposals_renders_fixed_sentence() {
    let src = VotingSource::from_fixture(r#"{"data":{"proposals":[]}}"#, "daocity.eth", "CityDAO");
    let text = src.summarize(now()).await.expect("voting digest");
    assert!(text.starts_with("🗳 There's no active proposal on [CityDAO Snapshot]"));
    assert!(!text.contains("👉"));
}
