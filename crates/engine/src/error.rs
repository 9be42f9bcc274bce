//! Engine error types.

use common::{HoldId, TicketId, TierId};
use domain::{DomainError, HoldStatus, TicketStatus};
use ledger::LedgerError;
use thiserror::Error;

/// Broad classification of an [`EngineError`].
///
/// Contention outcomes are ordinary results under load; only
/// `Infrastructure` warrants a retry with backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Contention,
    Integration,
    InvariantViolation,
    Infrastructure,
    InvalidRequest,
}

impl ErrorKind {
    /// Returns the kind as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Contention => "contention",
            ErrorKind::Integration => "integration",
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::Infrastructure => "infrastructure",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fewer units than requested could be held.
    #[error("Insufficient inventory in tier {tier_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        tier_id: TierId,
        requested: u32,
        available: u32,
    },

    /// The hold's lease ran out before the operation.
    #[error("Hold {0} has expired")]
    HoldExpired(HoldId),

    /// The hold was already released, purchased or failed.
    #[error("Hold {hold_id} is {status}, not active")]
    HoldNotActive { hold_id: HoldId, status: HoldStatus },

    /// The ticket was already checked in.
    #[error("Ticket {0} has already been redeemed")]
    AlreadyRedeemed(TicketId),

    /// The ticket is not in `sold` status, or its sale was refunded.
    #[error("Ticket {ticket_id} is not purchased (status: {status})")]
    NotPurchased {
        ticket_id: TicketId,
        status: TicketStatus,
    },

    /// The payment collaborator declined the charge.
    #[error("Payment declined for hold {hold_id}: {reason}")]
    PaymentDeclined { hold_id: HoldId, reason: String },

    /// Units of a paid hold were swept before they could be sold.
    #[error(
        "Hold {hold_id} lost {} unit(s) mid-purchase (refunded: {refunded})",
        .lost.len()
    )]
    PartialExpiry {
        hold_id: HoldId,
        lost: Vec<TicketId>,
        refunded: bool,
    },

    /// Payment service failure other than a decline.
    #[error("Payment service error: {0}")]
    PaymentService(String),

    /// Notification delivery failed.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Unit allocation would exceed the tier or engine capacity.
    #[error("Capacity exceeded for tier {tier_id}: capacity {capacity}, requested {requested}")]
    Capacity {
        tier_id: TierId,
        capacity: u32,
        requested: u64,
    },

    /// A tier's counts exceed its capacity.
    #[error("Invariant violation in tier {tier_id}: {detail}")]
    InvariantViolation { tier_id: TierId, detail: String },

    /// Writes to the tier are suspended after an invariant violation.
    #[error("Tier {0} is halted")]
    TierHalted(TierId),

    /// Tier not found.
    #[error("Tier not found: {0}")]
    TierNotFound(TierId),

    /// Tier already exists.
    #[error("Tier already exists: {0}")]
    TierAlreadyExists(TierId),

    /// Ticket not found.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// Hold not found.
    #[error("Hold not found: {0}")]
    HoldNotFound(HoldId),

    /// Invalid request argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Domain rule broken by an internal request.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The durable store could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl EngineError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InsufficientInventory { .. }
            | EngineError::HoldExpired(_)
            | EngineError::HoldNotActive { .. }
            | EngineError::AlreadyRedeemed(_)
            | EngineError::NotPurchased { .. } => ErrorKind::Contention,
            EngineError::PaymentDeclined { .. }
            | EngineError::PartialExpiry { .. }
            | EngineError::PaymentService(_)
            | EngineError::Notification(_) => ErrorKind::Integration,
            EngineError::InvariantViolation { .. }
            | EngineError::TierHalted(_)
            | EngineError::Domain(_) => ErrorKind::InvariantViolation,
            EngineError::StoreUnavailable(_) => ErrorKind::Infrastructure,
            EngineError::Capacity { .. }
            | EngineError::TierNotFound(_)
            | EngineError::TierAlreadyExists(_)
            | EngineError::TicketNotFound(_)
            | EngineError::HoldNotFound(_)
            | EngineError::InvalidArgument(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Returns true for outcomes that are expected under concurrent load.
    pub fn is_contention(&self) -> bool {
        self.kind() == ErrorKind::Contention
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Capacity {
                tier_id,
                capacity,
                existing,
                requested,
            } => EngineError::Capacity {
                tier_id,
                capacity,
                requested: existing + u64::from(requested),
            },
            LedgerError::InvalidArgument(msg) => EngineError::InvalidArgument(msg),
            LedgerError::TierNotFound(id) => EngineError::TierNotFound(id),
            LedgerError::TierAlreadyExists(id) => EngineError::TierAlreadyExists(id),
            LedgerError::TierHalted(id) => EngineError::TierHalted(id),
            LedgerError::TicketNotFound(id) => EngineError::TicketNotFound(id),
            LedgerError::HoldNotFound(id) => EngineError::HoldNotFound(id),
            LedgerError::HoldAlreadyExists(id) => {
                EngineError::InvalidArgument(format!("hold {id} already exists"))
            }
            LedgerError::Domain(e) => EngineError::Domain(e),
            err @ (LedgerError::Unavailable(_)
            | LedgerError::Database(_)
            | LedgerError::Migration(_)) => EngineError::StoreUnavailable(err.to_string()),
        }
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
