// src/api.rs
//! HTTP command surface: one digest per request, plus a manual broadcast trigger.

use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::citizen::{CitizenNft, CitizenTier};
use crate::error::DigestError;
use crate::orchestrator::Orchestrator;
use crate::sources::SourceKind;
use crate::transport::MessageTransport;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// `None` when no chat transport is configured; `/broadcast` then answers 503.
    pub transport: Option<Arc<dyn MessageTransport>>,
    pub order: Vec<SourceKind>,
    /// Citizen NFT reads; `/citizens` answers 404 without them.
    pub citizens: Option<Arc<CitizenNft>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/digest/{source}", get(digest))
        .route("/broadcast", post(broadcast))
        .route("/citizens", get(citizen_supply))
        .route("/citizens/{address}", get(citizen_balances))
        .route("/citizens/holders/{tier}", get(citizen_holders))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn status_for(e: &DigestError) -> StatusCode {
    match e {
        DigestError::Configuration(_) => StatusCode::NOT_FOUND,
        DigestError::Fetch(_) | DigestError::DataIntegrity(_) => StatusCode::BAD_GATEWAY,
    }
}

async fn digest(State(state): State<AppState>, Path(source): Path<String>) -> Response {
    let kind: SourceKind = match source.parse() {
        Ok(k) => k,
        Err(msg) => return (StatusCode::NOT_FOUND, msg).into_response(),
    };
    match state.orchestrator.get_digest(kind).await {
        Ok(text) => text.into_response(),
        Err(e) => (status_for(&e), e.to_string()).into_response(),
    }
}

async fn broadcast(State(state): State<AppState>) -> Response {
    let Some(transport) = state.transport.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "no message transport configured",
        )
            .into_response();
    };
    let report = state
        .orchestrator
        .broadcast_all(&state.order, transport.as_ref())
        .await;
    Json(report).into_response()
}

fn citizens(state: &AppState) -> Result<&CitizenNft, Response> {
    state
        .citizens
        .as_deref()
        .ok_or_else(|| (StatusCode::NOT_FOUND, "citizen reads are not configured").into_response())
}

async fn citizen_supply(State(state): State<AppState>) -> Response {
    let nft = match citizens(&state) {
        Ok(nft) => nft,
        Err(resp) => return resp,
    };
    match nft.supplies().await {
        Ok(supplies) => Json(supplies).into_response(),
        Err(e) => (status_for(&e), e.to_string()).into_response(),
    }
}

async fn citizen_balances(State(state): State<AppState>, Path(address): Path<String>) -> Response {
    let nft = match citizens(&state) {
        Ok(nft) => nft,
        Err(resp) => return resp,
    };
    match nft.balances(&address).await {
        Ok(balances) => Json(balances).into_response(),
        Err(DigestError::Configuration(msg)) => (StatusCode::BAD_REQUEST, msg).into_response(),
        Err(e) => (status_for(&e), e.to_string()).into_response(),
    }
}

async fn citizen_holders(State(state): State<AppState>, Path(tier): Path<String>) -> Response {
    let nft = match citizens(&state) {
        Ok(nft) => nft,
        Err(resp) => return resp,
    };
    let tier: CitizenTier = match tier.parse() {
        Ok(t) => t,
        Err(msg) => return (StatusCode::NOT_FOUND, msg).into_response(),
    };
    match nft.holders(tier).await {
        Ok(holders) => Json(holders).into_response(),
        Err(e) => (status_for(&e), e.to_string()).into_response(),
    }
}
