use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    DomainError, Hold, HoldStatus, StatusCounts, Tier, TicketStatus, TicketUnit,
    TransitionMetadata,
};

use crate::{HoldId, Result, TicketId, TierId, UnitQuery};

/// Core trait for inventory ledger implementations.
///
/// The ledger stores tiers, ticket units and hold records. All
/// implementations must be thread-safe (Send + Sync) and must make
/// [`try_transition`](InventoryLedger::try_transition) linearizable per
/// ticket unit.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Records a new tier.
    ///
    /// Fails with `TierAlreadyExists` if the tier ID is taken.
    async fn create_tier(&self, tier: Tier) -> Result<()>;

    /// Records a new tier together with `total_capacity` available units,
    /// stamped with the tier's `created_at`.
    ///
    /// Either the tier and all its units are stored or nothing is.
    async fn create_tier_with_units(&self, tier: Tier) -> Result<Vec<TicketId>>;

    /// Retrieves a tier record.
    async fn get_tier(&self, tier_id: &TierId) -> Result<Option<Tier>>;

    /// Marks a tier as halted. Idempotent.
    async fn halt_tier(&self, tier_id: &TierId) -> Result<()>;

    /// Allocates `count` new units in `Available` status.
    ///
    /// Fails with `InvalidArgument` if `count` is zero and with `Capacity`
    /// if the tier would end up with more units than its capacity. The
    /// capacity check and the insert are atomic.
    async fn create_units(
        &self,
        tier_id: &TierId,
        count: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Vec<TicketId>>;

    /// Atomically moves one unit from `expected` to `next`.
    ///
    /// Returns `Ok(false)` when the unit's current status is not `expected`
    /// (or, when `expected` is `Held`, the unit belongs to a different hold
    /// than `metadata.hold_id`). That outcome signals contention or an
    /// already-consumed unit; it is not an error.
    async fn try_transition(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        next: TicketStatus,
        metadata: &TransitionMetadata,
    ) -> Result<bool>;

    /// Retrieves a single unit.
    async fn get_unit(&self, ticket_id: TicketId) -> Result<Option<TicketUnit>>;

    /// Retrieves several units. Unknown IDs are skipped.
    async fn get_units(&self, ticket_ids: &[TicketId]) -> Result<Vec<TicketUnit>>;

    /// Retrieves units matching a query, oldest-created first.
    async fn find_units(&self, query: UnitQuery) -> Result<Vec<TicketUnit>>;

    /// Counts a tier's units per status.
    ///
    /// Advisory only: the counts may be stale as soon as they are returned.
    async fn status_counts(&self, tier_id: &TierId) -> Result<StatusCounts>;

    /// Records a new hold.
    async fn insert_hold(&self, hold: Hold) -> Result<()>;

    /// Retrieves a hold record.
    async fn get_hold(&self, hold_id: HoldId) -> Result<Option<Hold>>;

    /// Atomically moves a hold from `expected` to `next` status.
    ///
    /// Returns `Ok(false)` if the hold is not in `expected` status.
    async fn set_hold_status(
        &self,
        hold_id: HoldId,
        expected: HoldStatus,
        next: HoldStatus,
    ) -> Result<bool>;

    /// Moves an active hold's expiry from `current` to `new_expires_at`,
    /// restamping the expiry of its units that are still held.
    ///
    /// Returns `Ok(false)` if the hold is no longer active or its expiry is
    /// no longer `current` (a concurrent extension won).
    async fn extend_hold(
        &self,
        hold_id: HoldId,
        current: DateTime<Utc>,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Retrieves active holds whose expiry is strictly before `now`,
    /// earliest expiry first. Holds in halted tiers are left out.
    async fn expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Hold>>;
}

/// Extension trait providing convenience methods for ledgers.
#[async_trait]
pub trait InventoryLedgerExt: InventoryLedger {
    /// Returns the number of units currently available in a tier.
    ///
    /// Use for display hints only, never for correctness decisions.
    async fn query_available_count(&self, tier_id: &TierId) -> Result<u64> {
        Ok(self.status_counts(tier_id).await?.available)
    }

    /// Returns a unit's current status, or None if it doesn't exist.
    async fn get_status(&self, ticket_id: TicketId) -> Result<Option<TicketStatus>> {
        Ok(self.get_unit(ticket_id).await?.map(|unit| unit.status))
    }
}

// Blanket implementation for all InventoryLedger implementations
impl<T: InventoryLedger + ?Sized> InventoryLedgerExt for T {}

/// Validates a transition request before it reaches the store.
pub fn validate_transition(
    expected: TicketStatus,
    next: TicketStatus,
    metadata: &TransitionMetadata,
) -> std::result::Result<(), DomainError> {
    expected.ensure_transition(next)?;

    if next == TicketStatus::Held
        && (metadata.holder_ref.is_none()
            || metadata.hold_id.is_none()
            || metadata.hold_expires_at.is_none())
    {
        return Err(DomainError::MissingHoldMetadata);
    }

    Ok(())
}
