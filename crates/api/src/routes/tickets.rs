//! Ticket lookup and check-in endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{HolderRef, TicketId};
use domain::{TicketStatus, TicketUnit};
use ledger::InventoryLedger;
use serde::Serialize;

use super::parse_ticket_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct TicketStatusResponse {
    pub ticket_id: TicketId,
    pub status: TicketStatus,
}

/// GET /tickets/{ticket_id}
#[tracing::instrument(skip(state))]
pub async fn get<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(ticket_id): Path<String>,
) -> Result<Json<TicketUnit>, ApiError> {
    let unit = state.engine.get_ticket(parse_ticket_id(&ticket_id)?).await?;
    Ok(Json(unit))
}

/// GET /tickets/{ticket_id}/status
#[tracing::instrument(skip(state))]
pub async fn status<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(ticket_id): Path<String>,
) -> Result<Json<TicketStatusResponse>, ApiError> {
    let ticket_id = parse_ticket_id(&ticket_id)?;
    let status = state.engine.get_ticket_status(ticket_id).await?;
    Ok(Json(TicketStatusResponse { ticket_id, status }))
}

/// POST /tickets/{ticket_id}/redeem
#[tracing::instrument(skip(state))]
pub async fn redeem<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(ticket_id): Path<String>,
) -> Result<Json<TicketUnit>, ApiError> {
    let unit = state.engine.redeem(parse_ticket_id(&ticket_id)?).await?;
    Ok(Json(unit))
}

/// GET /holders/{holder_ref}/tickets
#[tracing::instrument(skip(state))]
pub async fn for_holder<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(holder_ref): Path<String>,
) -> Result<Json<Vec<TicketUnit>>, ApiError> {
    let units = state
        .engine
        .tickets_for_holder(&HolderRef::new(holder_ref))
        .await?;
    Ok(Json(units))
}
