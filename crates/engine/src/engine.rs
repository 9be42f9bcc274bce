//! Reservation Engine facade.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{HoldId, HolderRef, TicketId, TierId};
use domain::{Hold, Money, StatusCounts, Tier, TicketStatus, TicketUnit};
use ledger::{InventoryLedger, InventoryLedgerExt, UnitQuery};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::hold_manager::{HoldManager, SweepReport};
use crate::integrity::IntegrityGuard;
use crate::purchase::{PurchaseCoordinator, PurchaseReceipt};
use crate::redemption::RedemptionGate;
use crate::services::notification::NotificationService;
use crate::services::payment::PaymentService;

/// A tier with its per-status unit counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierSummary {
    pub tier: Tier,
    pub counts: StatusCounts,
}

/// The public operation surface of the reservation engine.
///
/// Validates arguments and delegates to the hold manager, purchase
/// coordinator and redemption gate.
pub struct ReservationEngine<L, P, N> {
    ledger: L,
    holds: HoldManager<L, N>,
    purchases: PurchaseCoordinator<L, P, N>,
    redemption: RedemptionGate<L, N>,
    guard: IntegrityGuard<L>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl<L, P, N> ReservationEngine<L, P, N>
where
    L: InventoryLedger + Clone,
    P: PaymentService,
    N: NotificationService,
{
    /// Creates an engine with the default configuration and the system clock.
    pub fn new(ledger: L, payment: P, notifier: N) -> Self {
        Self::with_settings(
            ledger,
            payment,
            notifier,
            EngineConfig::default(),
            Arc::new(SystemClock),
        )
    }

    /// Creates an engine with explicit configuration and clock.
    pub fn with_settings(
        ledger: L,
        payment: P,
        notifier: N,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let payment = Arc::new(payment);
        let notifier = Arc::new(notifier);
        let config = Arc::new(config);

        Self {
            holds: HoldManager::new(
                ledger.clone(),
                notifier.clone(),
                clock.clone(),
                config.clone(),
            ),
            purchases: PurchaseCoordinator::new(
                ledger.clone(),
                payment,
                notifier.clone(),
                clock.clone(),
            ),
            redemption: RedemptionGate::new(ledger.clone(), notifier, clock.clone()),
            guard: IntegrityGuard::new(ledger.clone()),
            ledger,
            clock,
            config,
        }
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gets a reference to the underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Creates a tier and allocates `capacity` available units for it.
    #[tracing::instrument(skip(self))]
    pub async fn create_event_tier(
        &self,
        tier_id: TierId,
        capacity: u32,
        price: Money,
    ) -> Result<Tier> {
        if tier_id.as_str().trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "tier_id must not be empty".to_string(),
            ));
        }
        if price.is_negative() {
            return Err(EngineError::InvalidArgument(
                "price must not be negative".to_string(),
            ));
        }
        if capacity > self.config.max_tier_capacity {
            return Err(EngineError::Capacity {
                tier_id,
                capacity: self.config.max_tier_capacity,
                requested: u64::from(capacity),
            });
        }

        let now = self.clock.now();
        let tier = Tier::new(tier_id, capacity, price, now);
        self.ledger.create_tier_with_units(tier.clone()).await?;

        tracing::info!(capacity, price = %price, "tier created");
        Ok(tier)
    }

    /// Holds `quantity` units of a tier for `holder_ref`.
    pub async fn reserve(
        &self,
        tier_id: &TierId,
        quantity: u32,
        holder_ref: HolderRef,
        hold_seconds: Option<u64>,
    ) -> Result<Hold> {
        self.holds
            .reserve(tier_id, quantity, holder_ref, hold_seconds)
            .await
    }

    /// Cancels a hold, returning its units to inventory.
    pub async fn release(&self, hold_id: HoldId) -> Result<Hold> {
        self.holds.release(hold_id).await
    }

    /// Extends a live hold.
    pub async fn extend_hold(&self, hold_id: HoldId, additional_seconds: u64) -> Result<Hold> {
        self.holds.extend(hold_id, additional_seconds).await
    }

    /// Pays for a hold and sells its units.
    pub async fn purchase(&self, hold_id: HoldId, payment_ref: &str) -> Result<PurchaseReceipt> {
        self.purchases.purchase(hold_id, payment_ref).await
    }

    /// Checks in a sold ticket.
    pub async fn redeem(&self, ticket_id: TicketId) -> Result<TicketUnit> {
        self.redemption.redeem(ticket_id).await
    }

    /// Releases holds that expired before `now`.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        self.holds.sweep_expired(now).await
    }

    pub async fn get_ticket_status(&self, ticket_id: TicketId) -> Result<TicketStatus> {
        self.ledger
            .get_status(ticket_id)
            .await?
            .ok_or(EngineError::TicketNotFound(ticket_id))
    }

    pub async fn get_ticket(&self, ticket_id: TicketId) -> Result<TicketUnit> {
        self.ledger
            .get_unit(ticket_id)
            .await?
            .ok_or(EngineError::TicketNotFound(ticket_id))
    }

    /// Looks up several tickets; unknown ids are left out.
    pub async fn get_tickets(&self, ticket_ids: &[TicketId]) -> Result<Vec<TicketUnit>> {
        Ok(self.ledger.get_units(ticket_ids).await?)
    }

    /// Every unit currently held, sold or redeemed by a buyer.
    pub async fn tickets_for_holder(&self, holder_ref: &HolderRef) -> Result<Vec<TicketUnit>> {
        Ok(self
            .ledger
            .find_units(UnitQuery::for_holder(holder_ref.clone()))
            .await?)
    }

    pub async fn get_hold(&self, hold_id: HoldId) -> Result<Hold> {
        self.ledger
            .get_hold(hold_id)
            .await?
            .ok_or(EngineError::HoldNotFound(hold_id))
    }

    /// Advisory count of available units; may be stale on return.
    pub async fn available_count(&self, tier_id: &TierId) -> Result<u64> {
        Ok(self.ledger.query_available_count(tier_id).await?)
    }

    pub async fn tier_summary(&self, tier_id: &TierId) -> Result<TierSummary> {
        let tier = self
            .ledger
            .get_tier(tier_id)
            .await?
            .ok_or_else(|| EngineError::TierNotFound(tier_id.clone()))?;
        let counts = self.ledger.status_counts(tier_id).await?;
        Ok(TierSummary { tier, counts })
    }

    /// Runs the capacity integrity check on demand.
    pub async fn verify_tier(&self, tier_id: &TierId) -> Result<StatusCounts> {
        self.guard.verify(tier_id).await
    }
}
