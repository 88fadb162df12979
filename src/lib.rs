// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod auth;
pub mod chain;
pub mod citizen;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod markdown;
pub mod metrics;
pub mod orchestrator;
pub mod render;
pub mod scheduler;
pub mod sources;
pub mod transport;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::AppConfig;
pub use crate::error::{DigestError, DigestResult};
pub use crate::orchestrator::{BroadcastReport, Orchestrator};
pub use crate::sources::{DigestSource, SourceKind};
pub use crate::transport::{MessageTransport, TelegramTransport};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `DIGEST_LOG_JSON=1` switches to JSON lines.
/// Safe to call more than once (later calls are no-ops).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("digest=info,transport=info,scheduler=info,warn"));
    let json = std::env::var("DIGEST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
