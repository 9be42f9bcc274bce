use chrono::{DateTime, Utc};
use domain::TicketStatus;

use crate::{HolderRef, TierId};

/// Builder for selecting ticket units.
///
/// Results are always ordered oldest-created first, which gives `reserve`
/// a deterministic, fair allocation order.
#[derive(Debug, Clone, Default)]
pub struct UnitQuery {
    /// Filter by tier.
    pub tier_id: Option<TierId>,

    /// Filter by current status.
    pub status: Option<TicketStatus>,

    /// Filter by buyer.
    pub holder_ref: Option<HolderRef>,

    /// Only units whose `hold_expires_at` is strictly before this instant.
    pub hold_expires_before: Option<DateTime<Utc>>,

    /// Maximum number of units to return.
    pub limit: Option<usize>,
}

impl UnitQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for units of a tier in a given status.
    pub fn in_tier(tier_id: TierId, status: TicketStatus) -> Self {
        Self {
            tier_id: Some(tier_id),
            status: Some(status),
            ..Default::default()
        }
    }

    /// Creates a query for all units recorded against a buyer.
    pub fn for_holder(holder_ref: HolderRef) -> Self {
        Self {
            holder_ref: Some(holder_ref),
            ..Default::default()
        }
    }

    /// Filters by status.
    pub fn status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters units whose hold lease ended before `instant`.
    pub fn hold_expires_before(mut self, instant: DateTime<Utc>) -> Self {
        self.hold_expires_before = Some(instant);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_tier_sets_tier_and_status() {
        let query = UnitQuery::in_tier(TierId::new("floor"), TicketStatus::Available).limit(3);
        assert_eq!(query.tier_id, Some(TierId::new("floor")));
        assert_eq!(query.status, Some(TicketStatus::Available));
        assert_eq!(query.limit, Some(3));
        assert!(query.holder_ref.is_none());
    }

    #[test]
    fn builder_chains_lease_filter() {
        let now = Utc::now();
        let query = UnitQuery::new()
            .status(TicketStatus::Held)
            .hold_expires_before(now);
        assert_eq!(query.hold_expires_before, Some(now));
        assert!(query.tier_id.is_none());
    }
}
