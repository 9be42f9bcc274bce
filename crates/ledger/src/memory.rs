use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Hold, HoldStatus, StatusCounts, Tier, TicketStatus, TicketUnit, TransitionMetadata,
};
use tokio::sync::RwLock;

use crate::{
    HoldId, LedgerError, Result, TicketId, TierId, UnitQuery,
    store::{InventoryLedger, validate_transition},
};

#[derive(Default)]
struct LedgerState {
    tiers: HashMap<TierId, Tier>,
    units: HashMap<TicketId, TicketUnit>,
    /// Unit IDs in insertion order.
    sequence: Vec<TicketId>,
    holds: HashMap<HoldId, Hold>,
}

impl LedgerState {
    fn allocate(&mut self, tier_id: &TierId, count: u32, created_at: DateTime<Utc>) -> Vec<TicketId> {
        let mut ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let unit = TicketUnit::new(tier_id.clone(), created_at);
            ids.push(unit.ticket_id);
            self.sequence.push(unit.ticket_id);
            self.units.insert(unit.ticket_id, unit);
        }
        ids
    }
}

/// In-memory inventory ledger.
///
/// Provides the same contract as the PostgreSQL implementation. A single
/// lock guards the state, so every compare-and-set is trivially atomic.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the total number of units across all tiers.
    pub async fn unit_count(&self) -> usize {
        self.state.read().await.units.len()
    }

    /// Returns the total number of hold records.
    pub async fn hold_count(&self) -> usize {
        self.state.read().await.holds.len()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable(
                "in-memory ledger switched off".to_string(),
            ));
        }
        Ok(())
    }
}

fn matches_query(unit: &TicketUnit, query: &UnitQuery) -> bool {
    if let Some(ref tier_id) = query.tier_id
        && &unit.tier_id != tier_id
    {
        return false;
    }
    if let Some(status) = query.status
        && unit.status != status
    {
        return false;
    }
    if let Some(ref holder) = query.holder_ref
        && unit.holder_ref.as_ref() != Some(holder)
    {
        return false;
    }
    if let Some(before) = query.hold_expires_before {
        match unit.hold_expires_at {
            Some(expires_at) if expires_at < before => {}
            _ => return false,
        }
    }
    true
}

#[async_trait]
impl InventoryLedger for InMemoryLedger {
    async fn create_tier(&self, tier: Tier) -> Result<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        if state.tiers.contains_key(&tier.tier_id) {
            return Err(LedgerError::TierAlreadyExists(tier.tier_id));
        }
        state.tiers.insert(tier.tier_id.clone(), tier);
        Ok(())
    }

    async fn create_tier_with_units(&self, tier: Tier) -> Result<Vec<TicketId>> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        if state.tiers.contains_key(&tier.tier_id) {
            return Err(LedgerError::TierAlreadyExists(tier.tier_id));
        }
        let ids = state.allocate(&tier.tier_id, tier.total_capacity, tier.created_at);
        state.tiers.insert(tier.tier_id.clone(), tier);
        Ok(ids)
    }

    async fn get_tier(&self, tier_id: &TierId) -> Result<Option<Tier>> {
        self.ensure_available()?;
        Ok(self.state.read().await.tiers.get(tier_id).cloned())
    }

    async fn halt_tier(&self, tier_id: &TierId) -> Result<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let tier = state
            .tiers
            .get_mut(tier_id)
            .ok_or_else(|| LedgerError::TierNotFound(tier_id.clone()))?;
        tier.halted = true;
        Ok(())
    }

    async fn create_units(
        &self,
        tier_id: &TierId,
        count: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Vec<TicketId>> {
        self.ensure_available()?;
        if count == 0 {
            return Err(LedgerError::InvalidArgument(
                "unit count must be greater than 0".to_string(),
            ));
        }

        let mut state = self.state.write().await;

        let tier = state
            .tiers
            .get(tier_id)
            .ok_or_else(|| LedgerError::TierNotFound(tier_id.clone()))?;
        if tier.halted {
            return Err(LedgerError::TierHalted(tier_id.clone()));
        }
        let capacity = tier.total_capacity;

        let existing = state
            .units
            .values()
            .filter(|unit| &unit.tier_id == tier_id)
            .count() as u64;
        if existing + u64::from(count) > u64::from(capacity) {
            return Err(LedgerError::Capacity {
                tier_id: tier_id.clone(),
                capacity,
                existing,
                requested: count,
            });
        }

        Ok(state.allocate(tier_id, count, created_at))
    }

    async fn try_transition(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        next: TicketStatus,
        metadata: &TransitionMetadata,
    ) -> Result<bool> {
        self.ensure_available()?;
        validate_transition(expected, next, metadata)?;

        let mut state = self.state.write().await;
        let unit = state
            .units
            .get_mut(&ticket_id)
            .ok_or(LedgerError::TicketNotFound(ticket_id))?;

        if !unit.matches(expected, metadata) {
            return Ok(false);
        }

        unit.apply_transition(next, metadata)?;
        Ok(true)
    }

    async fn get_unit(&self, ticket_id: TicketId) -> Result<Option<TicketUnit>> {
        self.ensure_available()?;
        Ok(self.state.read().await.units.get(&ticket_id).cloned())
    }

    async fn get_units(&self, ticket_ids: &[TicketId]) -> Result<Vec<TicketUnit>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(ticket_ids
            .iter()
            .filter_map(|id| state.units.get(id).cloned())
            .collect())
    }

    async fn find_units(&self, query: UnitQuery) -> Result<Vec<TicketUnit>> {
        self.ensure_available()?;
        let state = self.state.read().await;

        // Stable sort keeps insertion order among equal timestamps
        let mut units: Vec<_> = state
            .sequence
            .iter()
            .filter_map(|id| state.units.get(id))
            .filter(|unit| matches_query(unit, &query))
            .cloned()
            .collect();
        units.sort_by_key(|unit| unit.created_at);

        if let Some(limit) = query.limit {
            units.truncate(limit);
        }
        Ok(units)
    }

    async fn status_counts(&self, tier_id: &TierId) -> Result<StatusCounts> {
        self.ensure_available()?;
        let state = self.state.read().await;

        if !state.tiers.contains_key(tier_id) {
            return Err(LedgerError::TierNotFound(tier_id.clone()));
        }
        Ok(StatusCounts::from_statuses(
            state
                .units
                .values()
                .filter(|unit| &unit.tier_id == tier_id)
                .map(|unit| unit.status),
        ))
    }

    async fn insert_hold(&self, hold: Hold) -> Result<()> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        if state.holds.contains_key(&hold.hold_id) {
            return Err(LedgerError::HoldAlreadyExists(hold.hold_id));
        }
        state.holds.insert(hold.hold_id, hold);
        Ok(())
    }

    async fn get_hold(&self, hold_id: HoldId) -> Result<Option<Hold>> {
        self.ensure_available()?;
        Ok(self.state.read().await.holds.get(&hold_id).cloned())
    }

    async fn set_hold_status(
        &self,
        hold_id: HoldId,
        expected: HoldStatus,
        next: HoldStatus,
    ) -> Result<bool> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let hold = state
            .holds
            .get_mut(&hold_id)
            .ok_or(LedgerError::HoldNotFound(hold_id))?;

        if hold.status != expected {
            return Ok(false);
        }
        hold.status = next;
        Ok(true)
    }

    async fn extend_hold(
        &self,
        hold_id: HoldId,
        current: DateTime<Utc>,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let hold = state
            .holds
            .get_mut(&hold_id)
            .ok_or(LedgerError::HoldNotFound(hold_id))?;

        if hold.status != HoldStatus::Active || hold.expires_at != current {
            return Ok(false);
        }
        hold.expires_at = new_expires_at;
        let ticket_ids = hold.ticket_ids.clone();

        for ticket_id in ticket_ids {
            if let Some(unit) = state.units.get_mut(&ticket_id)
                && unit.status == TicketStatus::Held
                && unit.hold_id == Some(hold_id)
            {
                unit.hold_expires_at = Some(new_expires_at);
            }
        }
        Ok(true)
    }

    async fn expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Hold>> {
        self.ensure_available()?;
        let state = self.state.read().await;

        let mut holds: Vec<_> = state
            .holds
            .values()
            .filter(|hold| hold.status == HoldStatus::Active && hold.expires_at < now)
            .filter(|hold| {
                !state
                    .tiers
                    .get(&hold.tier_id)
                    .is_some_and(|tier| tier.halted)
            })
            .cloned()
            .collect();
        holds.sort_by_key(|hold| hold.expires_at);
        holds.truncate(limit);
        Ok(holds)
    }
}
