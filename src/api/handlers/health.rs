use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct TierHealth {
    pub tier: crate::services::tiers::Tier,
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub tiers: Vec<TierHealth>,
    pub memory_entries: usize,
    pub version: String,
}

/// Always 200: the memory tier keeps uploads working when the others are
/// down, so a degraded tier is reported rather than failed.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Storage tier health", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let tiers: Vec<TierHealth> = state
        .store
        .check_tiers()
        .await
        .into_iter()
        .map(|(tier, up)| TierHealth {
            tier,
            status: if up { "connected" } else { "disconnected" }.to_string(),
        })
        .collect();

    let degraded = tiers.iter().any(|t| t.status != "connected");

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" }.to_string(),
        tiers,
        memory_entries: state.store.memory().len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
