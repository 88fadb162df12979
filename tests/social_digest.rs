// tests/social_digest.rs
//
// Social timeline digest from a captured timeline (offline mode).
//
// Covered:
// - 5 posts, 2 inside the window, target 3 -> 2 "today" blocks + 1 "other" block
// - no posts in window -> no overflow content at all
// - target below the number of today's posts -> overflow section omitted

use chrono::{DateTime, TimeZone, Utc};

use dao_digest::render::DIVIDER;
use dao_digest::sources::social::SocialSource;
use dao_digest::DigestSource;

const TIMELINE: &str = include_str!("fixtures/timeline.json");

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn two_today_plus_one_other() {
    let src = SocialSource::from_fixture(TIMELINE, "CityDAO").with_target_count(3);
    let text = src.summarize(now()).await.expect("social digest");

    assert_eq!(text.matches("👉 ").count(), 3, "{text}");
    assert!(text.starts_with("🌆 Here's latest CityDAO tweets \\([@CityDAO](https://twitter.com/citydao)\\)"));
    assert!(text.contains("🎏 There's 2 Tweets\\!"));

    let (today, other) = text.split_once(DIVIDER).expect("overflow section present");
    assert!(today.contains("CIP-23 is live & voting closes soon"));
    assert!(today.contains("Town hall recording"));
    assert!(other.contains("Checkout other tweets from"));
    // first post outside the window, in timeline order
    assert!(other.contains("Parcel 1 site visit starts now"));
    assert!(!other.contains("Weekly update"));
    assert!(text.ends_with("🟩 Have a great day Citizen\\! 🟩"));
}

#[tokio::test]
async fn engagement_and_permalink_in_block() {
    let src = SocialSource::from_fixture(TIMELINE, "CityDAO");
    let text = src.summarize(now()).await.expect("social digest");
    assert!(text.contains("💚 048\t🔁 017"));
    assert!(text.contains("[Read full tweet here](https://twitter.com/CityDAO/status/1797100000000000004)"));
    assert!(text.contains("01 Jun 2024 20:30:00 UTC"));
}

#[tokio::test]
async fn nothing_in_window_means_no_overflow() {
    let later = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
    let src = SocialSource::from_fixture(TIMELINE, "CityDAO").with_target_count(3);
    let text = src.summarize(later).await.expect("social digest");

    assert!(text.ends_with("🥱 There's no new tweets from [@CityDAO](https://twitter.com/citydao)\\!"));
    assert!(!text.contains(DIVIDER));
    assert!(!text.contains("👉"));
}

#[tokio::test]
async fn target_already_met_drops_overflow() {
    let src = SocialSource::from_fixture(TIMELINE, "CityDAO").with_target_count(2);
    let text = src.summarize(now()).await.expect("social digest");
    assert_eq!(text.matches("👉 ").count(), 2);
    assert!(!text.contains(DIVIDER));
}
