//! Hold record: a time-bounded claim on one or more ticket units.

use chrono::{DateTime, Utc};
use common::{HoldId, HolderRef, TicketId, TierId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle of a hold record.
///
/// ```text
/// Active ──┬──► Released
///          ├──► Purchased
///          └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    /// Units are claimed for the holder until `expires_at`.
    #[default]
    Active,

    /// Cancelled by the buyer or swept after expiry.
    Released,

    /// Converted into sold tickets.
    Purchased,

    /// A purchase lost units to a concurrent sweep; kept for reconciliation.
    Failed,
}

impl HoldStatus {
    /// All statuses.
    pub const ALL: [HoldStatus; 4] = [
        HoldStatus::Active,
        HoldStatus::Released,
        HoldStatus::Purchased,
        HoldStatus::Failed,
    ];

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Active => "active",
            HoldStatus::Released => "released",
            HoldStatus::Purchased => "purchased",
            HoldStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HoldStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HoldStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

/// A time-bounded claim on a set of ticket units for one buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub hold_id: HoldId,
    pub tier_id: TierId,
    pub ticket_ids: Vec<TicketId>,
    pub holder_ref: HolderRef,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: HoldStatus,
}

impl Hold {
    /// Returns true once `now` has reached the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true if the hold can still be purchased or extended.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status == HoldStatus::Active && !self.is_expired_at(now)
    }

    /// Number of units covered by the hold.
    pub fn quantity(&self) -> u32 {
        u32::try_from(self.ticket_ids.len()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn hold(now: DateTime<Utc>) -> Hold {
        Hold {
            hold_id: HoldId::new(),
            tier_id: TierId::new("floor"),
            ticket_ids: vec![TicketId::new(), TicketId::new()],
            holder_ref: HolderRef::new("buyer"),
            created_at: now,
            expires_at: now + Duration::seconds(30),
            status: HoldStatus::Active,
        }
    }

    #[test]
    fn test_live_until_expiry_instant() {
        let now = Utc::now();
        let hold = hold(now);

        assert!(hold.is_live_at(now));
        assert!(hold.is_live_at(now + Duration::seconds(29)));
        assert!(!hold.is_live_at(now + Duration::seconds(30)));
        assert!(hold.is_expired_at(now + Duration::seconds(31)));
    }

    #[test]
    fn test_released_hold_is_not_live() {
        let now = Utc::now();
        let mut hold = hold(now);
        hold.status = HoldStatus::Released;
        assert!(!hold.is_live_at(now));
    }

    #[test]
    fn test_quantity_counts_units() {
        assert_eq!(hold(Utc::now()).quantity(), 2);
    }

    #[test]
    fn test_status_parse() {
        for status in HoldStatus::ALL {
            assert_eq!(status.as_str().parse::<HoldStatus>().unwrap(), status);
        }
    }
}
