//! Hold Manager: reserving, extending, releasing and sweeping holds.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{HoldId, HolderRef, TicketId, TierId};
use domain::{
    Hold, HoldReleasedData, HoldStatus, ReleaseReason, TicketEvent, TicketStatus,
    TransitionMetadata,
};
use ledger::{InventoryLedger, UnitQuery};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::integrity::IntegrityGuard;
use crate::services::notification::{NotificationService, deliver};

/// What a sweep pass reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Expired holds moved to `released`.
    pub holds_released: u32,
    /// Units returned to `available` from those holds.
    pub units_released: u32,
    /// Held units whose lease lapsed without a live hold record.
    pub orphans_reclaimed: u32,
    /// Units found stuck in `released` and made available.
    pub stragglers_reclaimed: u32,
}

impl SweepReport {
    /// Returns true if the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        *self == SweepReport::default()
    }
}

/// Creates and ends holds against the inventory ledger.
pub struct HoldManager<L, N> {
    ledger: L,
    guard: IntegrityGuard<L>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl<L, N> HoldManager<L, N>
where
    L: InventoryLedger + Clone,
    N: NotificationService,
{
    pub fn new(
        ledger: L,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            guard: IntegrityGuard::new(ledger.clone()),
            ledger,
            notifier,
            clock,
            config,
        }
    }

    /// Holds `quantity` available units of a tier for a buyer.
    ///
    /// Either every requested unit ends up held under the returned hold, or
    /// none does and `InsufficientInventory` reports how many could be held.
    #[tracing::instrument(skip(self, holder_ref))]
    pub async fn reserve(
        &self,
        tier_id: &TierId,
        quantity: u32,
        holder_ref: HolderRef,
        hold_seconds: Option<u64>,
    ) -> Result<Hold> {
        if quantity == 0 || quantity > self.config.max_tickets_per_hold {
            return Err(EngineError::InvalidArgument(format!(
                "quantity must be between 1 and {}",
                self.config.max_tickets_per_hold
            )));
        }
        if holder_ref.as_str().trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "holder_ref must not be empty".to_string(),
            ));
        }
        let duration = self.config.hold_duration(hold_seconds)?;
        self.guard.ensure_writable(tier_id).await?;

        let now = self.clock.now();
        let hold_id = HoldId::new();
        let expires_at = now + duration;
        let metadata = TransitionMetadata::at(now)
            .with_hold(hold_id)
            .with_holder(holder_ref.clone(), expires_at);

        let mut held = Vec::with_capacity(quantity as usize);
        if let Err(e) = self
            .claim_units(tier_id, quantity, &metadata, &mut held)
            .await
        {
            self.roll_back(hold_id, &held, now).await;
            return Err(e);
        }

        if held.len() < quantity as usize {
            let available = held.len() as u32;
            self.roll_back(hold_id, &held, now).await;
            metrics::counter!("reservations_total", "outcome" => "insufficient").increment(1);
            tracing::info!(requested = quantity, available, "not enough inventory to hold");
            return Err(EngineError::InsufficientInventory {
                tier_id: tier_id.clone(),
                requested: quantity,
                available,
            });
        }

        let hold = Hold {
            hold_id,
            tier_id: tier_id.clone(),
            ticket_ids: held,
            holder_ref,
            created_at: now,
            expires_at,
            status: HoldStatus::Active,
        };

        if let Err(e) = self.ledger.insert_hold(hold.clone()).await {
            self.roll_back(hold_id, &hold.ticket_ids, now).await;
            return Err(e.into());
        }

        metrics::counter!("reservations_total", "outcome" => "held").increment(1);
        tracing::info!(%hold_id, quantity, %expires_at, "hold created");
        Ok(hold)
    }

    /// Claims candidates oldest-first, retrying for units lost to races.
    async fn claim_units(
        &self,
        tier_id: &TierId,
        quantity: u32,
        metadata: &TransitionMetadata,
        held: &mut Vec<TicketId>,
    ) -> Result<()> {
        for _ in 0..self.config.reserve_attempts.max(1) {
            let needed = quantity as usize - held.len();
            let candidates = self
                .ledger
                .find_units(
                    UnitQuery::in_tier(tier_id.clone(), TicketStatus::Available).limit(needed),
                )
                .await?;
            if candidates.is_empty() {
                break;
            }

            for unit in candidates {
                let won = self
                    .ledger
                    .try_transition(
                        unit.ticket_id,
                        TicketStatus::Available,
                        TicketStatus::Held,
                        metadata,
                    )
                    .await?;
                if won {
                    held.push(unit.ticket_id);
                } else {
                    tracing::debug!(ticket_id = %unit.ticket_id, "lost race for unit");
                }
            }

            if held.len() == quantity as usize {
                break;
            }
        }
        Ok(())
    }

    async fn roll_back(&self, hold_id: HoldId, held: &[TicketId], now: DateTime<Utc>) {
        if held.is_empty() {
            return;
        }
        if let Err(e) = self.release_units(hold_id, held, now).await {
            // Units stay held until their lease lapses and the sweep reclaims them
            tracing::warn!(%hold_id, error = %e, "reserve rollback incomplete");
        }
    }

    /// Returns the hold's units to `available`.
    ///
    /// Each unit goes `held → released` pinned to `hold_id`, then
    /// `released → available`. Units no longer held by this hold are skipped.
    ///
    /// Returns the units that left the hold. A unit counts once its pinned
    /// first step wins; if the second step loses, the sweep's straggler pass
    /// already made it available.
    pub(crate) async fn release_units(
        &self,
        hold_id: HoldId,
        ticket_ids: &[TicketId],
        now: DateTime<Utc>,
    ) -> Result<Vec<TicketId>> {
        let pinned = TransitionMetadata::at(now).with_hold(hold_id);
        let plain = TransitionMetadata::at(now);
        let mut released = Vec::with_capacity(ticket_ids.len());

        for &ticket_id in ticket_ids {
            let won = self
                .ledger
                .try_transition(ticket_id, TicketStatus::Held, TicketStatus::Released, &pinned)
                .await?;
            if !won {
                continue;
            }
            released.push(ticket_id);
            self.ledger
                .try_transition(
                    ticket_id,
                    TicketStatus::Released,
                    TicketStatus::Available,
                    &plain,
                )
                .await?;
        }
        Ok(released)
    }

    /// Cancels a hold. Releasing a hold that is no longer active is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, hold_id: HoldId) -> Result<Hold> {
        let hold = self.load_hold(hold_id).await?;
        if hold.status != HoldStatus::Active {
            tracing::debug!(status = %hold.status, "hold already ended");
            return Ok(hold);
        }
        self.guard.ensure_writable(&hold.tier_id).await?;

        let now = self.clock.now();
        self.end_hold(&hold, ReleaseReason::Cancelled, now).await?;
        self.load_hold(hold_id).await
    }

    /// Ends an active hold and frees its units.
    ///
    /// Returns `None` if another caller ended the hold first.
    async fn end_hold(
        &self,
        hold: &Hold,
        reason: ReleaseReason,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>> {
        let claimed = self
            .ledger
            .set_hold_status(hold.hold_id, HoldStatus::Active, HoldStatus::Released)
            .await?;
        if !claimed {
            return Ok(None);
        }

        let released = self
            .release_units(hold.hold_id, &hold.ticket_ids, now)
            .await?;
        let count = released.len() as u32;

        metrics::counter!("holds_released_total", "reason" => reason.as_str()).increment(1);
        tracing::info!(
            hold_id = %hold.hold_id,
            reason = reason.as_str(),
            released = count,
            "hold released"
        );

        deliver(
            self.notifier.as_ref(),
            TicketEvent::HoldReleased(HoldReleasedData {
                hold_id: hold.hold_id,
                tier_id: hold.tier_id.clone(),
                released_units: released,
                reason,
                released_at: now,
            }),
        )
        .await;

        Ok(Some(count))
    }

    /// Pushes a live hold's expiry forward by `additional_seconds`.
    #[tracing::instrument(skip(self))]
    pub async fn extend(&self, hold_id: HoldId, additional_seconds: u64) -> Result<Hold> {
        if additional_seconds == 0 {
            return Err(EngineError::InvalidArgument(
                "additional_seconds must be greater than 0".to_string(),
            ));
        }
        let additional = Duration::seconds(i64::try_from(additional_seconds).unwrap_or(i64::MAX));

        for _ in 0..self.config.reserve_attempts.max(1) {
            let hold = self.load_hold(hold_id).await?;
            self.guard.ensure_writable(&hold.tier_id).await?;

            let now = self.clock.now();
            if !hold.is_live_at(now) {
                return Err(EngineError::HoldExpired(hold_id));
            }

            let new_expires_at = hold.expires_at + additional;
            if new_expires_at > now + self.config.max_hold() {
                return Err(EngineError::InvalidArgument(format!(
                    "extension would exceed the maximum hold of {} seconds",
                    self.config.max_hold_seconds
                )));
            }

            if self
                .ledger
                .extend_hold(hold_id, hold.expires_at, new_expires_at)
                .await?
            {
                tracing::info!(%new_expires_at, "hold extended");
                return self.load_hold(hold_id).await;
            }
            tracing::debug!("hold changed during extension, retrying");
        }

        Err(EngineError::HoldExpired(hold_id))
    }

    /// Releases every hold whose lease ended before `now`.
    ///
    /// Also reclaims held units whose lease lapsed without a live hold record
    /// and units left in `released` by an interrupted release. Halted tiers
    /// are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut halted: HashMap<TierId, bool> = HashMap::new();

        loop {
            let expired = self
                .ledger
                .expired_holds(now, self.config.sweep_batch_size)
                .await?;
            if expired.is_empty() {
                break;
            }

            // The ledger leaves halted tiers out of the page; this catches a
            // tier halted after the scan
            let mut progressed = false;
            for hold in &expired {
                if self.is_halted(&hold.tier_id, &mut halted).await? {
                    continue;
                }
                if let Some(units) = self.end_hold(hold, ReleaseReason::Expired, now).await? {
                    report.holds_released += 1;
                    report.units_released += units;
                    progressed = true;
                }
            }
            if !progressed || expired.len() < self.config.sweep_batch_size {
                break;
            }
        }

        let lapsed = self
            .ledger
            .find_units(
                UnitQuery::new()
                    .status(TicketStatus::Held)
                    .hold_expires_before(now),
            )
            .await?;
        for unit in lapsed {
            let Some(hold_id) = unit.hold_id else {
                continue;
            };
            if self.is_halted(&unit.tier_id, &mut halted).await? {
                continue;
            }
            // A hold that just won its purchase is about to sell these units
            if let Some(hold) = self.ledger.get_hold(hold_id).await?
                && hold.status == HoldStatus::Purchased
            {
                continue;
            }
            report.orphans_reclaimed += self
                .release_units(hold_id, &[unit.ticket_id], now)
                .await?
                .len() as u32;
        }

        let stragglers = self
            .ledger
            .find_units(UnitQuery::new().status(TicketStatus::Released))
            .await?;
        let plain = TransitionMetadata::at(now);
        for unit in stragglers {
            if self.is_halted(&unit.tier_id, &mut halted).await? {
                continue;
            }
            if self
                .ledger
                .try_transition(
                    unit.ticket_id,
                    TicketStatus::Released,
                    TicketStatus::Available,
                    &plain,
                )
                .await?
            {
                report.stragglers_reclaimed += 1;
            }
        }

        if report.holds_released > 0 {
            metrics::counter!("sweep_released_holds_total")
                .increment(u64::from(report.holds_released));
        }
        if !report.is_empty() {
            tracing::info!(
                holds = report.holds_released,
                units = report.units_released,
                orphans = report.orphans_reclaimed,
                stragglers = report.stragglers_reclaimed,
                "sweep reclaimed inventory"
            );
        }
        Ok(report)
    }

    async fn is_halted(&self, tier_id: &TierId, cache: &mut HashMap<TierId, bool>) -> Result<bool> {
        if let Some(&halted) = cache.get(tier_id) {
            return Ok(halted);
        }
        let halted = self
            .ledger
            .get_tier(tier_id)
            .await?
            .is_some_and(|tier| tier.halted);
        if halted {
            tracing::warn!(%tier_id, "sweep skipping halted tier");
        }
        cache.insert(tier_id.clone(), halted);
        Ok(halted)
    }

    async fn load_hold(&self, hold_id: HoldId) -> Result<Hold> {
        self.ledger
            .get_hold(hold_id)
            .await?
            .ok_or(EngineError::HoldNotFound(hold_id))
    }
}
