//! Run the daily report once and exit.
//!
//! `--dry-run` renders every digest to stdout instead of sending it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};

use dao_digest::config::AppConfig;
use dao_digest::http::build_client;
use dao_digest::transport::RecordingTransport;
use dao_digest::{init_tracing, MessageTransport, Orchestrator, TelegramTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let dry_run = std::env::args().skip(1).any(|a| a == "--dry-run");

    let cfg = AppConfig::load_default().context("loading digest config")?;
    let client = build_client(Duration::from_secs(cfg.http.timeout_secs))?;
    let orchestrator = Orchestrator::from_config(&cfg, client.clone())?;

    let recorder = Arc::new(RecordingTransport::new());
    let transport: Arc<dyn MessageTransport> = if dry_run {
        recorder.clone() as Arc<dyn MessageTransport>
    } else {
        let Some(t) = cfg.telegram.as_ref() else {
            bail!("[telegram] section missing; use --dry-run to print instead");
        };
        Arc::new(
            TelegramTransport::new(t.token.clone(), t.chat_id.clone(), client)
                .with_api_base(&t.api_base)
                .with_timeout(cfg.http.timeout_secs)
                .with_message_limit(t.message_limit),
        ) as Arc<dyn MessageTransport>
    };

    let report = orchestrator
        .broadcast_all(&cfg.schedule.order, transport.as_ref())
        .await;

    for msg in recorder.messages() {
        println!("{msg}\n");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.sent.is_empty() && !report.failed.is_empty() {
        bail!("every digest failed");
    }
    Ok(())
}
