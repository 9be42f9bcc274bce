//! Ticket unit lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of a ticket unit in its lifecycle.
///
/// State transitions:
/// ```text
/// Available ──► Held ──┬──► Sold ──► Redeemed
///     ▲                │
///     └── Released ◄───┘
/// ```
///
/// `Redeemed` is terminal. `Sold` and `Redeemed` units are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Unit can be reserved.
    #[default]
    Available,

    /// Unit is claimed by a live hold.
    Held,

    /// Unit has been paid for.
    Sold,

    /// Unit has been checked in (terminal state).
    Redeemed,

    /// Unit is on its way back to `Available` after a hold ended.
    Released,
}

impl TicketStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Available,
        TicketStatus::Held,
        TicketStatus::Sold,
        TicketStatus::Redeemed,
        TicketStatus::Released,
    ];

    /// Returns true if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Available, Held)
                | (Held, Sold)
                | (Held, Released)
                | (Released, Available)
                | (Sold, Redeemed)
        )
    }

    /// Validates a transition, returning an error if it is not allowed.
    pub fn ensure_transition(&self, next: TicketStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::IllegalTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// Returns true if a unit in this status occupies tier capacity.
    pub fn occupies_capacity(&self) -> bool {
        matches!(
            self,
            TicketStatus::Held | TicketStatus::Sold | TicketStatus::Redeemed
        )
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Redeemed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Available => "available",
            TicketStatus::Held => "held",
            TicketStatus::Sold => "sold",
            TicketStatus::Redeemed => "redeemed",
            TicketStatus::Released => "released",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}
