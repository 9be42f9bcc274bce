//! Operator endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use engine::SweepReport;
use ledger::InventoryLedger;

use crate::AppState;
use crate::error::ApiError;

/// POST /admin/sweep
///
/// Runs one expiry sweep at the engine's current time.
#[tracing::instrument(skip(state))]
pub async fn sweep<L: InventoryLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<Json<SweepReport>, ApiError> {
    let now = state.engine.now();
    let report = state.engine.sweep_expired(now).await?;
    Ok(Json(report))
}
