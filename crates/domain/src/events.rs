//! Ticket lifecycle events handed to the notification collaborator.

use chrono::{DateTime, Utc};
use common::{HoldId, HolderRef, TicketId, TierId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Events emitted by the engine after a state change has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TicketEvent {
    /// A hold was converted into paid tickets.
    TicketsPurchased(TicketsPurchasedData),

    /// A sold ticket was checked in.
    TicketRedeemed(TicketRedeemedData),

    /// A hold's units went back to available inventory.
    HoldReleased(HoldReleasedData),
}

impl TicketEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::TicketsPurchased(_) => "TicketsPurchased",
            TicketEvent::TicketRedeemed(_) => "TicketRedeemed",
            TicketEvent::HoldReleased(_) => "HoldReleased",
        }
    }

    /// Returns the tier the event belongs to.
    pub fn tier_id(&self) -> &TierId {
        match self {
            TicketEvent::TicketsPurchased(data) => &data.tier_id,
            TicketEvent::TicketRedeemed(data) => &data.tier_id,
            TicketEvent::HoldReleased(data) => &data.tier_id,
        }
    }
}

/// Data for TicketsPurchased event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketsPurchasedData {
    pub hold_id: HoldId,
    pub tier_id: TierId,
    pub holder_ref: HolderRef,
    pub ticket_ids: Vec<TicketId>,
    pub amount: Money,
    pub payment_id: String,
    pub purchased_at: DateTime<Utc>,
}

/// Data for TicketRedeemed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRedeemedData {
    pub ticket_id: TicketId,
    pub tier_id: TierId,
    pub holder_ref: Option<HolderRef>,
    pub redeemed_at: DateTime<Utc>,
}

/// Why a hold was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// Buyer or system cancelled the hold explicitly.
    Cancelled,
    /// The hold passed its expiry and was swept.
    Expired,
}

impl ReleaseReason {
    /// Returns the reason as a string, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::Cancelled => "cancelled",
            ReleaseReason::Expired => "expired",
        }
    }
}

/// Data for HoldReleased event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldReleasedData {
    pub hold_id: HoldId,
    pub tier_id: TierId,
    /// Units this release actually returned to inventory.
    pub released_units: Vec<TicketId>,
    pub reason: ReleaseReason,
    pub released_at: DateTime<Utc>,
}
