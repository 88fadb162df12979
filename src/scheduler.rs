// src/scheduler.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use metrics::counter;
use tokio::task::JoinHandle;

use crate::orchestrator::Orchestrator;
use crate::sources::SourceKind;
use crate::transport::MessageTransport;

/// The first `at` (UTC) strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Spawn the daily broadcast: sleep until the next `at`, broadcast `order`, repeat.
pub fn spawn_daily_scheduler(
    orchestrator: Arc<Orchestrator>,
    transport: Arc<dyn MessageTransport>,
    order: Vec<SourceKind>,
    at: NaiveTime,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, at);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(
                target: "scheduler",
                next = %next.format("%Y-%m-%d %H:%M:%S UTC"),
                wait_secs = wait.as_secs(),
                "daily broadcast scheduled"
            );
            tokio::time::sleep(wait).await;

            counter!("digest_scheduler_runs_total").increment(1);
            let report = orchestrator.broadcast_all(&order, transport.as_ref()).await;
            tracing::info!(
                target: "scheduler",
                sent = report.sent.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "daily broadcast tick"
            );
        }
    })
}
