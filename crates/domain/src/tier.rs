//! Event tier record and per-status counts.

use chrono::{DateTime, Utc};
use common::TierId;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::status::TicketStatus;

/// A pool of interchangeable ticket capacity for an event.
///
/// `total_capacity` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub tier_id: TierId,
    pub total_capacity: u32,

    /// Price of one ticket unit.
    pub price: Money,

    pub created_at: DateTime<Utc>,

    /// Set when an internal-consistency fault was detected; halted tiers
    /// accept no further writes.
    pub halted: bool,
}

impl Tier {
    /// Creates a new, writable tier.
    pub fn new(
        tier_id: TierId,
        total_capacity: u32,
        price: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tier_id,
            total_capacity,
            price,
            created_at,
            halted: false,
        }
    }
}

/// Number of units of a tier in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub available: u64,
    pub held: u64,
    pub sold: u64,
    pub redeemed: u64,
    pub released: u64,
}

impl StatusCounts {
    /// Tallies the statuses of a set of units.
    pub fn from_statuses(statuses: impl IntoIterator<Item = TicketStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.record(status, 1);
        }
        counts
    }

    /// Adds `n` units of `status` to the tally.
    pub fn record(&mut self, status: TicketStatus, n: u64) {
        match status {
            TicketStatus::Available => self.available += n,
            TicketStatus::Held => self.held += n,
            TicketStatus::Sold => self.sold += n,
            TicketStatus::Redeemed => self.redeemed += n,
            TicketStatus::Released => self.released += n,
        }
    }

    /// Total number of units ever created for the tier.
    pub fn total(&self) -> u64 {
        self.available + self.held + self.sold + self.redeemed + self.released
    }

    /// Units that were paid for (sold or redeemed).
    pub fn committed(&self) -> u64 {
        self.sold + self.redeemed
    }

    /// Units occupying capacity (held, sold or redeemed).
    pub fn occupied(&self) -> u64 {
        self.held + self.sold + self.redeemed
    }

    /// Returns true if the counts are consistent with `capacity`.
    pub fn within_capacity(&self, capacity: u32) -> bool {
        let capacity = u64::from(capacity);
        self.committed() <= capacity && self.occupied() <= capacity
    }
}
