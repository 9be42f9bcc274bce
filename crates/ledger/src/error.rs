use domain::DomainError;
use thiserror::Error;

use crate::{HoldId, TicketId, TierId};

/// Errors that can occur when interacting with the inventory ledger.
///
/// A lost compare-and-set race is not an error; see
/// [`InventoryLedger::try_transition`](crate::InventoryLedger::try_transition).
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Creating the units would exceed the tier's capacity.
    #[error(
        "Capacity exceeded for tier {tier_id}: capacity {capacity}, existing {existing}, requested {requested}"
    )]
    Capacity {
        tier_id: TierId,
        capacity: u32,
        existing: u64,
        requested: u32,
    },

    /// The request arguments were rejected before touching the store.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Tier not found: {0}")]
    TierNotFound(TierId),

    #[error("Tier already exists: {0}")]
    TierAlreadyExists(TierId),

    /// The tier was halted after an integrity fault and accepts no writes.
    #[error("Tier is halted: {0}")]
    TierHalted(TierId),

    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    #[error("Hold not found: {0}")]
    HoldNotFound(HoldId),

    #[error("Hold already exists: {0}")]
    HoldAlreadyExists(HoldId),

    /// The requested transition breaks the ticket state machine, or a
    /// stored record could not be decoded.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl LedgerError {
    /// Returns true for failures of the store itself rather than of the
    /// request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            LedgerError::Unavailable(_) | LedgerError::Database(_) | LedgerError::Migration(_)
        )
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
