// src/sources/calendar.rs
//! Today's events from the shared calendar.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{DigestSource, Mode, SourceKind};
use crate::error::{DigestError, DigestResult};
use crate::http::fetch_text;
use crate::markdown::{code, escape, escape_url, link, truncate_chars};
use crate::render::{render_feed, FeedTemplate, TEXT_BUDGET};
use crate::window::day_floor;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_CALENDAR_ID: &str = "c_4r6hnu78hifcmgimcgm0huhc6k@group.calendar.google.com";

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub url: String,
    pub summary: String,
    pub creator: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub meeting_url: Option<String>,
}

#[derive(Deserialize)]
struct EventPage {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    html_link: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    creator: Option<RawPerson>,
    #[serde(default)]
    start: Option<RawTime>,
    #[serde(default)]
    end: Option<RawTime>,
    #[serde(default)]
    hangout_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPerson {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTime {
    #[serde(default)]
    date_time: Option<String>,
}

/// `[start of today, start of tomorrow)` in UTC.
pub fn today_range(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day_floor(now);
    (start, start + Duration::days(1))
}

fn instant(t: &Option<RawTime>) -> Option<DateTime<Utc>> {
    let raw = t.as_ref()?.date_time.as_deref()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an events page. Events without both a start and an end instant
/// (all-day entries, malformed items) are dropped with a warning.
pub fn parse_events(body: &str) -> DigestResult<Vec<CalendarEvent>> {
    let page: EventPage = serde_json::from_str(body)?;
    let mut out = Vec::with_capacity(page.items.len());
    for ev in page.items {
        let summary = ev.summary.unwrap_or_else(|| "(untitled)".to_string());
        let (Some(start), Some(end)) = (instant(&ev.start), instant(&ev.end)) else {
            warn!(target: "digest", %summary, "calendar event without start/end instant skipped");
            continue;
        };
        let creator = ev
            .creator
            .and_then(|c| c.email.or(c.display_name))
            .unwrap_or_else(|| "unknown".to_string());
        out.push(CalendarEvent {
            url: ev.html_link,
            summary,
            creator,
            start,
            end,
            meeting_url: ev.hangout_link,
        });
    }
    Ok(out)
}

pub struct CalendarHttp {
    api_base: String,
    api_key: String,
    client: Client,
}

pub struct CalendarSource {
    mode: Mode<CalendarHttp>,
    calendar_id: String,
    community: String,
}

impl CalendarSource {
    pub fn new(
        api_base: impl Into<String>,
        calendar_id: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            mode: Mode::Http(CalendarHttp {
                api_base: api_base.into(),
                api_key: api_key.into(),
                client,
            }),
            calendar_id: calendar_id.into(),
            community: "CityDAO".to_string(),
        }
    }

    pub fn from_fixture(body: &str, calendar_id: impl Into<String>) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
            calendar_id: calendar_id.into(),
            community: "CityDAO".to_string(),
        }
    }

    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = community.into();
        self
    }

    pub fn calendar_url(&self) -> String {
        format!(
            "https://calendar.google.com/calendar/u/0/embed?src={}&ctz=UTC",
            self.calendar_id
        )
    }

    fn events_url(&self, api_base: &str) -> DigestResult<Url> {
        let mut url = Url::parse(api_base)
            .map_err(|e| DigestError::config(format!("calendar api_base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DigestError::config("calendar api_base cannot be a base"))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    /// Events starting within today's UTC day, ordered by start time.
    pub async fn fetch_today_events(&self, now: DateTime<Utc>) -> DigestResult<Vec<CalendarEvent>> {
        let body = match &self.mode {
            Mode::Fixture(body) => body.clone(),
            Mode::Http(http) => {
                let (start, end) = today_range(now);
                let time_min = start.format("%Y-%m-%dT%H:%M:%SZ").to_string();
                let time_max = end.format("%Y-%m-%dT%H:%M:%SZ").to_string();
                let req = http.client.get(self.events_url(&http.api_base)?).query(&[
                    ("key", http.api_key.as_str()),
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                    ("orderBy", "startTime"),
                    ("singleEvents", "true"),
                    ("timeZone", "UTC"),
                ]);
                fetch_text(req, "calendar events").await?
            }
        };
        let mut events = parse_events(&body)?;
        events.sort_by_key(|e| e.start);
        debug!(target: "digest", count = events.len(), "calendar events fetched");
        Ok(events)
    }

    pub fn render(&self, events: &[CalendarEvent]) -> String {
        let tpl = FeedTemplate {
            header: None,
            empty: format!(
                "🗓 There's no {} Event today\\!\n\nEnjoy your holiday🍻",
                escape(&self.community)
            ),
            count_line: format!(
                "🗓 There're {} events on {} today\\!",
                events.len(),
                link(&format!("{} Calendar", self.community), &self.calendar_url())
            ),
            overflow_header: String::new(),
            sign_off: "🧋 Have a wonderful day Citizen\\!".to_string(),
        };
        render_feed(&tpl, events, &[], 0, event_block)
    }
}

fn event_block(e: &CalendarEvent) -> String {
    let mut out = format!(
        "👉 {}\n  🕰 Time: {} \\- {}\n  🧑‍💻 Creator: {}\n",
        code(&truncate_chars(&e.summary, TEXT_BUDGET)),
        e.start.format("%H:%M:%S"),
        e.end.format("%H:%M:%S"),
        code(&truncate_chars(&e.creator, TEXT_BUDGET))
    );
    if !e.url.is_empty() {
        out.push_str(&format!("  📅 [Open in calendar]({})\n", escape_url(&e.url)));
    }
    if let Some(meeting) = &e.meeting_url {
        out.push_str(&format!("  🔗 Join meeting [here]({})\n", escape_url(meeting)));
    }
    out
}

#[async_trait]
impl DigestSource for CalendarSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Calendar
    }

    async fn summarize(&self, now: DateTime<Utc>) -> DigestResult<String> {
        let events = self.fetch_today_events(now).await?;
        Ok(self.render(&events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn range_covers_the_utc_day() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 18, 45, 0).unwrap();
        let (start, end) = today_range(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn events_missing_times_are_dropped() {
        let body = r#"{"items":[
            {"htmlLink":"https://cal/1","summary":"All hands","creator":{"email":"a@x.org"},
             "start":{"date":"2024-06-01"},"end":{"date":"2024-06-02"}},
            {"htmlLink":"https://cal/2","summary":"Parcel sync","creator":{"email":"b@x.org"},
             "start":{"dateTime":"2024-06-01T17:00:00+02:00"},"end":{"dateTime":"2024-06-01T16:00:00Z"},
             "hangoutLink":"https://meet.example/abc"}
        ]}"#;
        let events = parse_events(body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap());
        assert_eq!(events[0].meeting_url.as_deref(), Some("https://meet.example/abc"));
    }

    #[test]
    fn events_url_keeps_calendar_id_as_one_segment() {
        let src = CalendarSource::from_fixture("{}", "team/x@group.calendar.google.com");
        let url = src.events_url(DEFAULT_API_BASE).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team%2Fx@group.calendar.google.com/events"
        );
    }

    #[test]
    fn empty_day_renders_fixed_sentence() {
        let src = CalendarSource::from_fixture("{}", DEFAULT_CALENDAR_ID);
        assert_eq!(
            src.render(&[]),
            "🗓 There's no CityDAO Event today\\!\n\nEnjoy your holiday🍻"
        );
    }

    #[test]
    fn long_summaries_are_truncated_and_split_cleanly() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let event = CalendarEvent {
            url: String::new(),
            summary: "budget `review` ".repeat(400),
            creator: "ops@citydao.io".into(),
            start: at,
            end: at + Duration::hours(1),
            meeting_url: None,
        };
        let block = event_block(&event);
        let first = block.lines().next().unwrap();
        assert!(first.chars().count() < 2 * TEXT_BUDGET, "{first}");
        assert!(first.ends_with("...`"));

        let src = CalendarSource::from_fixture("{}", DEFAULT_CALENDAR_ID);
        let text = src.render(&vec![event; 60]);
        let limit = crate::transport::DEFAULT_MESSAGE_LIMIT;
        for part in crate::transport::split_message(&text, limit) {
            assert!(part.encode_utf16().count() <= limit);
            // Every code span opened in a part is closed in it.
            let unescaped = part.replace("\\\\", "").replace("\\`", "");
            assert_eq!(unescaped.matches('`').count() % 2, 0, "{part}");
        }
    }
}
