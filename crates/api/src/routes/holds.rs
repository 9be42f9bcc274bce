//! Hold lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::Hold;
use engine::PurchaseReceipt;
use ledger::InventoryLedger;
use serde::Deserialize;

use super::parse_hold_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ExtendRequest {
    pub additional_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub payment_ref: String,
}

/// GET /holds/{hold_id}
#[tracing::instrument(skip(state))]
pub async fn get<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(hold_id): Path<String>,
) -> Result<Json<Hold>, ApiError> {
    let hold = state.engine.get_hold(parse_hold_id(&hold_id)?).await?;
    Ok(Json(hold))
}

/// DELETE /holds/{hold_id}
///
/// Releasing a hold that is no longer active returns it unchanged.
#[tracing::instrument(skip(state))]
pub async fn release<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(hold_id): Path<String>,
) -> Result<Json<Hold>, ApiError> {
    let hold = state.engine.release(parse_hold_id(&hold_id)?).await?;
    Ok(Json(hold))
}

/// POST /holds/{hold_id}/extend
#[tracing::instrument(skip(state))]
pub async fn extend<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(hold_id): Path<String>,
    Json(req): Json<ExtendRequest>,
) -> Result<Json<Hold>, ApiError> {
    let hold = state
        .engine
        .extend_hold(parse_hold_id(&hold_id)?, req.additional_seconds)
        .await?;
    Ok(Json(hold))
}

/// POST /holds/{hold_id}/purchase
#[tracing::instrument(skip(state, req))]
pub async fn purchase<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(hold_id): Path<String>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<PurchaseReceipt>, ApiError> {
    let receipt = state
        .engine
        .purchase(parse_hold_id(&hold_id)?, &req.payment_ref)
        .await?;
    Ok(Json(receipt))
}
