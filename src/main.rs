//! DAO digest service: binary entrypoint.
//! Boots the HTTP command surface, the daily broadcast and the chat command poller.

use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::ShuttleAxum;

use dao_digest::chain::JsonRpcReader;
use dao_digest::citizen::{CitizenNft, Marketplace};
use dao_digest::config::AppConfig;
use dao_digest::http::build_client;
use dao_digest::metrics::Metrics;
use dao_digest::scheduler::spawn_daily_scheduler;
use dao_digest::transport::commands::spawn_command_loop;
use dao_digest::{api, init_tracing, MessageTransport, Orchestrator, TelegramTransport};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().map_err(anyhow::Error::from)?;
    let client =
        build_client(Duration::from_secs(cfg.http.timeout_secs)).map_err(anyhow::Error::from)?;
    let orchestrator =
        Arc::new(Orchestrator::from_config(&cfg, client.clone()).map_err(anyhow::Error::from)?);
    let metrics = Metrics::init()?;

    let telegram = cfg.telegram.as_ref().map(|t| {
        Arc::new(
            TelegramTransport::new(t.token.clone(), t.chat_id.clone(), client.clone())
                .with_api_base(&t.api_base)
                .with_timeout(cfg.http.timeout_secs)
                .with_message_limit(t.message_limit),
        )
    });

    let transport: Option<Arc<dyn MessageTransport>> = telegram
        .clone()
        .map(|t| t as Arc<dyn MessageTransport>);

    match (&transport, cfg.schedule.enabled) {
        (Some(tx), true) => {
            let at = cfg.schedule.daily_time().map_err(anyhow::Error::from)?;
            spawn_daily_scheduler(
                orchestrator.clone(),
                tx.clone(),
                cfg.schedule.order.clone(),
                at,
            );
        }
        (None, true) => {
            tracing::warn!(target: "scheduler", "no [telegram] section; daily broadcast disabled")
        }
        _ => {}
    }

    if let (Some(tg), Some(t)) = (&telegram, &cfg.telegram) {
        if t.commands {
            spawn_command_loop(orchestrator.clone(), tg.clone(), t.poll_timeout_secs);
        }
    }

    let citizens = cfg.citizen.as_ref().map(|c| {
        let reader = Arc::new(JsonRpcReader::new(c.rpc_url.clone(), client.clone()));
        let nft = CitizenNft::new(reader, c.contract.clone());
        let nft = match &c.api_key {
            Some(key) => nft.with_marketplace(Marketplace::new(
                c.marketplace_base.clone(),
                key.clone(),
                client.clone(),
            )),
            None => nft,
        };
        Arc::new(nft)
    });

    let state = api::AppState {
        orchestrator,
        transport,
        order: cfg.schedule.order.clone(),
        citizens,
    };
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
