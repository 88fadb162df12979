// src/metrics.rs
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use shuttle_axum::axum::{routing::get, Router};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_built_total", "Digests rendered successfully.");
        describe_counter!(
            "digest_failed_total",
            "Digests that failed to build or to be delivered."
        );
        describe_counter!("digest_sent_total", "Digests delivered by a broadcast.");
        describe_counter!(
            "digest_skipped_total",
            "Broadcast entries skipped because the digest was empty."
        );
        describe_counter!("digest_scheduler_runs_total", "Scheduled daily broadcasts started.");
        describe_histogram!("digest_fetch_ms", "Time to fetch and render one digest.");
        describe_gauge!(
            "digest_broadcast_last_run_ts",
            "Unix ts when the last broadcast finished."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
