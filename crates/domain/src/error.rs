//! Domain error types.

use thiserror::Error;

use crate::status::TicketStatus;

/// Errors raised by the pure domain model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The lifecycle state machine does not allow this transition.
    #[error("Illegal ticket transition: {from} -> {to}")]
    IllegalTransition {
        from: TicketStatus,
        to: TicketStatus,
    },

    /// A unit cannot become held without a holder and a hold.
    #[error("Transition to held requires a holder reference, hold id and expiry")]
    MissingHoldMetadata,

    /// A stored status string could not be parsed.
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}
