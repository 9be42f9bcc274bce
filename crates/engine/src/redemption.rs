//! Redemption Gate: single-use check-in of sold tickets.

use std::sync::Arc;

use common::TicketId;
use domain::{
    HoldStatus, TicketEvent, TicketRedeemedData, TicketStatus, TicketUnit, TransitionMetadata,
};
use ledger::InventoryLedger;

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::integrity::IntegrityGuard;
use crate::services::notification::{NotificationService, deliver};

/// Consumes sold tickets exactly once.
pub struct RedemptionGate<L, N> {
    ledger: L,
    guard: IntegrityGuard<L>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
}

impl<L, N> RedemptionGate<L, N>
where
    L: InventoryLedger + Clone,
    N: NotificationService,
{
    pub fn new(ledger: L, notifier: Arc<N>, clock: Arc<dyn Clock>) -> Self {
        Self {
            guard: IntegrityGuard::new(ledger.clone()),
            ledger,
            notifier,
            clock,
        }
    }

    /// Moves a ticket from `sold` to `redeemed`.
    ///
    /// A second attempt on the same ticket fails with `AlreadyRedeemed`.
    #[tracing::instrument(skip(self))]
    pub async fn redeem(&self, ticket_id: TicketId) -> Result<TicketUnit> {
        let unit = self.load(ticket_id).await?;
        self.guard.ensure_writable(&unit.tier_id).await?;

        match unit.status {
            TicketStatus::Sold => {}
            TicketStatus::Redeemed => return Err(self.reject_duplicate(ticket_id)),
            status => {
                metrics::counter!("redemptions_total", "outcome" => "not_purchased").increment(1);
                return Err(EngineError::NotPurchased { ticket_id, status });
            }
        }
        self.ensure_sale_settled(&unit).await?;

        let now = self.clock.now();
        let won = self
            .ledger
            .try_transition(
                ticket_id,
                TicketStatus::Sold,
                TicketStatus::Redeemed,
                &TransitionMetadata::at(now),
            )
            .await?;

        if !won {
            // Someone else got there between our read and the CAS
            let current = self.load(ticket_id).await?;
            return Err(match current.status {
                TicketStatus::Redeemed => self.reject_duplicate(ticket_id),
                status => EngineError::NotPurchased { ticket_id, status },
            });
        }

        metrics::counter!("redemptions_total", "outcome" => "redeemed").increment(1);
        tracing::info!("ticket redeemed");

        deliver(
            self.notifier.as_ref(),
            TicketEvent::TicketRedeemed(TicketRedeemedData {
                ticket_id,
                tier_id: unit.tier_id.clone(),
                holder_ref: unit.holder_ref.clone(),
                redeemed_at: now,
            }),
        )
        .await;

        self.guard.verify(&unit.tier_id).await?;
        self.load(ticket_id).await
    }

    /// A sold unit only admits entry if its hold completed the purchase.
    /// Units left sold by a refunded partial purchase belong to a `failed` hold.
    async fn ensure_sale_settled(&self, unit: &TicketUnit) -> Result<()> {
        let Some(hold_id) = unit.hold_id else {
            return Ok(());
        };
        match self.ledger.get_hold(hold_id).await? {
            Some(hold) if hold.status != HoldStatus::Purchased => {
                metrics::counter!("redemptions_total", "outcome" => "voided_sale").increment(1);
                tracing::warn!(%hold_id, hold_status = %hold.status, "ticket from an unsettled sale presented");
                Err(EngineError::NotPurchased {
                    ticket_id: unit.ticket_id,
                    status: unit.status,
                })
            }
            _ => Ok(()),
        }
    }

    fn reject_duplicate(&self, ticket_id: TicketId) -> EngineError {
        metrics::counter!("redemptions_total", "outcome" => "duplicate").increment(1);
        tracing::warn!("duplicate redemption attempt");
        EngineError::AlreadyRedeemed(ticket_id)
    }

    async fn load(&self, ticket_id: TicketId) -> Result<TicketUnit> {
        self.ledger
            .get_unit(ticket_id)
            .await?
            .ok_or(EngineError::TicketNotFound(ticket_id))
    }
}
