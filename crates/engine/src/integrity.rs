//! Capacity integrity guard.

use common::TierId;
use domain::{StatusCounts, Tier};
use ledger::InventoryLedger;

use crate::error::{EngineError, Result};

/// Checks tier counts against capacity and halts tiers that break it.
#[derive(Clone)]
pub struct IntegrityGuard<L> {
    ledger: L,
}

impl<L: InventoryLedger> IntegrityGuard<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Loads a tier, failing if it is missing or halted.
    pub async fn ensure_writable(&self, tier_id: &TierId) -> Result<Tier> {
        let tier = self
            .ledger
            .get_tier(tier_id)
            .await?
            .ok_or_else(|| EngineError::TierNotFound(tier_id.clone()))?;

        if tier.halted {
            return Err(EngineError::TierHalted(tier_id.clone()));
        }
        Ok(tier)
    }

    /// Verifies that the tier's occupied and committed counts fit its capacity.
    ///
    /// On violation the tier is halted in the ledger before the error is
    /// returned.
    #[tracing::instrument(skip(self))]
    pub async fn verify(&self, tier_id: &TierId) -> Result<StatusCounts> {
        let tier = self
            .ledger
            .get_tier(tier_id)
            .await?
            .ok_or_else(|| EngineError::TierNotFound(tier_id.clone()))?;
        let counts = self.ledger.status_counts(tier_id).await?;

        if counts.within_capacity(tier.total_capacity) {
            return Ok(counts);
        }

        let detail = format!(
            "capacity {} but held={} sold={} redeemed={}",
            tier.total_capacity, counts.held, counts.sold, counts.redeemed
        );
        metrics::counter!("integrity_violations_total").increment(1);
        tracing::error!(
            capacity = tier.total_capacity,
            held = counts.held,
            sold = counts.sold,
            redeemed = counts.redeemed,
            "OPERATOR ALERT: tier exceeds capacity, halting writes"
        );

        if !tier.halted
            && let Err(e) = self.ledger.halt_tier(tier_id).await
        {
            tracing::error!(error = %e, "failed to halt tier");
        }

        Err(EngineError::InvariantViolation {
            tier_id: tier_id.clone(),
            detail,
        })
    }
}
