//! Tier creation, inspection and reservation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{HolderRef, TierId};
use domain::{Hold, Money, StatusCounts, Tier};
use engine::TierSummary;
use ledger::InventoryLedger;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

/// Request body for creating a tier.
#[derive(Debug, Deserialize)]
pub struct CreateTierRequest {
    pub tier_id: String,
    pub capacity: u32,
    #[serde(default)]
    pub price_cents: i64,
}

/// Request body for reserving units of a tier.
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub quantity: u32,
    pub holder_ref: String,
    pub hold_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub tier_id: TierId,
    pub available: u64,
}

/// POST /tiers
#[tracing::instrument(skip(state))]
pub async fn create<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Json(req): Json<CreateTierRequest>,
) -> Result<(StatusCode, Json<Tier>), ApiError> {
    let tier = state
        .engine
        .create_event_tier(
            TierId::new(req.tier_id),
            req.capacity,
            Money::from_cents(req.price_cents),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(tier)))
}

/// GET /tiers/{tier_id}
#[tracing::instrument(skip(state))]
pub async fn get<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(tier_id): Path<String>,
) -> Result<Json<TierSummary>, ApiError> {
    let summary = state.engine.tier_summary(&TierId::new(tier_id)).await?;
    Ok(Json(summary))
}

/// GET /tiers/{tier_id}/available
#[tracing::instrument(skip(state))]
pub async fn available<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(tier_id): Path<String>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let tier_id = TierId::new(tier_id);
    // Unknown tiers are a 404 rather than a zero count
    state.engine.tier_summary(&tier_id).await?;
    let available = state.engine.available_count(&tier_id).await?;
    Ok(Json(AvailabilityResponse { tier_id, available }))
}

/// POST /tiers/{tier_id}/holds
#[tracing::instrument(skip(state))]
pub async fn reserve<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(tier_id): Path<String>,
    Json(req): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<Hold>), ApiError> {
    let hold = state
        .engine
        .reserve(
            &TierId::new(tier_id),
            req.quantity,
            HolderRef::new(req.holder_ref),
            req.hold_seconds,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(hold)))
}

/// POST /tiers/{tier_id}/verify
///
/// Runs the capacity check on demand; a violation halts the tier.
#[tracing::instrument(skip(state))]
pub async fn verify<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(tier_id): Path<String>,
) -> Result<Json<StatusCounts>, ApiError> {
    let counts = state.engine.verify_tier(&TierId::new(tier_id)).await?;
    Ok(Json(counts))
}
