//! HTTP route handlers.

pub mod admin;
pub mod health;
pub mod holds;
pub mod metrics;
pub mod tickets;
pub mod tiers;

use common::{HoldId, TicketId};
use uuid::Uuid;

use crate::error::ApiError;

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid {what}: {raw}")))
}

pub(crate) fn parse_hold_id(raw: &str) -> Result<HoldId, ApiError> {
    parse_uuid(raw, "hold id").map(HoldId::from_uuid)
}

pub(crate) fn parse_ticket_id(raw: &str) -> Result<TicketId, ApiError> {
    parse_uuid(raw, "ticket id").map(TicketId::from_uuid)
}
