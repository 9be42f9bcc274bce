//! Purchase Coordinator: turns a live hold into sold tickets.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{HoldId, HolderRef, TicketId, TierId};
use domain::{
    Hold, HoldStatus, Money, TicketEvent, TicketStatus, TicketsPurchasedData, TransitionMetadata,
};
use ledger::InventoryLedger;
use serde::Serialize;

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::integrity::IntegrityGuard;
use crate::services::notification::{NotificationService, deliver};
use crate::services::payment::{ChargeOutcome, PaymentService};

/// Result of a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    pub hold_id: HoldId,
    pub tier_id: TierId,
    pub holder_ref: HolderRef,
    pub ticket_ids: Vec<TicketId>,
    pub amount: Money,
    pub payment_id: String,
    pub purchased_at: DateTime<Utc>,
}

/// Coordinates payment capture with the `held → sold` transitions.
///
/// The hold record's `active → purchased` compare-and-set is the point of no
/// return: a concurrent release or sweep that claims the hold first makes the
/// purchase refund and fail.
pub struct PurchaseCoordinator<L, P, N> {
    ledger: L,
    guard: IntegrityGuard<L>,
    payment: Arc<P>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
}

impl<L, P, N> PurchaseCoordinator<L, P, N>
where
    L: InventoryLedger + Clone,
    P: PaymentService,
    N: NotificationService,
{
    pub fn new(ledger: L, payment: Arc<P>, notifier: Arc<N>, clock: Arc<dyn Clock>) -> Self {
        Self {
            guard: IntegrityGuard::new(ledger.clone()),
            ledger,
            payment,
            notifier,
            clock,
        }
    }

    /// Charges the buyer and sells every unit of the hold.
    #[tracing::instrument(skip(self, payment_ref))]
    pub async fn purchase(&self, hold_id: HoldId, payment_ref: &str) -> Result<PurchaseReceipt> {
        if payment_ref.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "payment_ref must not be empty".to_string(),
            ));
        }
        let started = std::time::Instant::now();

        // 1. Validate the hold is live and still owns its units
        let hold = self
            .ledger
            .get_hold(hold_id)
            .await?
            .ok_or(EngineError::HoldNotFound(hold_id))?;
        let tier = self.guard.ensure_writable(&hold.tier_id).await?;

        let now = self.clock.now();
        self.ensure_purchasable(&hold, now)?;
        self.ensure_units_held(&hold).await?;

        // 2. Capture payment
        let amount = tier.price.multiply(hold.quantity());
        let payment_id = match self.payment.charge(payment_ref, amount).await? {
            ChargeOutcome::Approved { payment_id } => payment_id,
            ChargeOutcome::Declined { reason } => {
                metrics::counter!("purchases_total", "outcome" => "declined").increment(1);
                tracing::info!(%reason, "payment declined, hold left intact");
                return Err(EngineError::PaymentDeclined { hold_id, reason });
            }
        };

        // 3. Claim the hold
        let claimed = self
            .ledger
            .set_hold_status(hold_id, HoldStatus::Active, HoldStatus::Purchased)
            .await?;
        if !claimed {
            self.refund(&payment_id).await;
            metrics::counter!("purchases_total", "outcome" => "lost_hold").increment(1);
            let current = self.ledger.get_hold(hold_id).await?;
            return Err(match current {
                Some(current) if current.is_expired_at(now) => EngineError::HoldExpired(hold_id),
                Some(current) => EngineError::HoldNotActive {
                    hold_id,
                    status: current.status,
                },
                None => EngineError::HoldNotFound(hold_id),
            });
        }

        // 4. Sell the units
        let sold_at = self.clock.now();
        let metadata = TransitionMetadata::at(sold_at).with_hold(hold_id);
        let mut lost = Vec::new();
        for &ticket_id in &hold.ticket_ids {
            let sold = self
                .ledger
                .try_transition(ticket_id, TicketStatus::Held, TicketStatus::Sold, &metadata)
                .await
                .inspect_err(|e| {
                    tracing::error!(%payment_id, error = %e, "store failed mid-purchase, needs reconciliation");
                })?;
            if !sold {
                lost.push(ticket_id);
            }
        }

        if !lost.is_empty() {
            return Err(self.fail_partial(&hold, &payment_id, lost).await);
        }

        let receipt = PurchaseReceipt {
            hold_id,
            tier_id: hold.tier_id.clone(),
            holder_ref: hold.holder_ref.clone(),
            ticket_ids: hold.ticket_ids.clone(),
            amount,
            payment_id,
            purchased_at: sold_at,
        };

        metrics::counter!("purchases_total", "outcome" => "purchased").increment(1);
        metrics::histogram!("purchase_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            payment_id = %receipt.payment_id,
            amount = %amount,
            tickets = receipt.ticket_ids.len(),
            "purchase completed"
        );

        deliver(
            self.notifier.as_ref(),
            TicketEvent::TicketsPurchased(TicketsPurchasedData {
                hold_id,
                tier_id: receipt.tier_id.clone(),
                holder_ref: receipt.holder_ref.clone(),
                ticket_ids: receipt.ticket_ids.clone(),
                amount,
                payment_id: receipt.payment_id.clone(),
                purchased_at: sold_at,
            }),
        )
        .await;

        self.guard.verify(&hold.tier_id).await?;
        Ok(receipt)
    }

    fn ensure_purchasable(&self, hold: &Hold, now: DateTime<Utc>) -> Result<()> {
        match hold.status {
            HoldStatus::Active if hold.is_expired_at(now) => {
                metrics::counter!("purchases_total", "outcome" => "expired").increment(1);
                Err(EngineError::HoldExpired(hold.hold_id))
            }
            HoldStatus::Active => Ok(()),
            HoldStatus::Released if hold.is_expired_at(now) => {
                metrics::counter!("purchases_total", "outcome" => "expired").increment(1);
                Err(EngineError::HoldExpired(hold.hold_id))
            }
            status => Err(EngineError::HoldNotActive {
                hold_id: hold.hold_id,
                status,
            }),
        }
    }

    async fn ensure_units_held(&self, hold: &Hold) -> Result<()> {
        let units = self.ledger.get_units(&hold.ticket_ids).await?;
        let owned = units
            .iter()
            .filter(|unit| unit.status == TicketStatus::Held && unit.hold_id == Some(hold.hold_id))
            .count();

        if owned != hold.ticket_ids.len() {
            tracing::warn!(
                hold_id = %hold.hold_id,
                owned,
                expected = hold.ticket_ids.len(),
                "hold no longer owns all its units"
            );
            metrics::counter!("purchases_total", "outcome" => "expired").increment(1);
            return Err(EngineError::HoldExpired(hold.hold_id));
        }
        Ok(())
    }

    /// Compensates a purchase that lost units after payment was captured.
    async fn fail_partial(&self, hold: &Hold, payment_id: &str, lost: Vec<TicketId>) -> EngineError {
        let refunded = self.refund(payment_id).await;

        if let Err(e) = self
            .ledger
            .set_hold_status(hold.hold_id, HoldStatus::Purchased, HoldStatus::Failed)
            .await
        {
            tracing::error!(hold_id = %hold.hold_id, error = %e, "failed to mark hold failed");
        }

        metrics::counter!("purchases_total", "outcome" => "partial_expiry").increment(1);
        tracing::error!(
            hold_id = %hold.hold_id,
            %payment_id,
            lost = lost.len(),
            refunded,
            "OPERATOR ALERT: units swept mid-purchase, reconciliation required"
        );

        EngineError::PartialExpiry {
            hold_id: hold.hold_id,
            lost,
            refunded,
        }
    }

    async fn refund(&self, payment_id: &str) -> bool {
        match self.payment.refund(payment_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(%payment_id, error = %e, "refund failed");
                false
            }
        }
    }
}
