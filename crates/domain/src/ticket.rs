//! Ticket unit record and the field stamping applied on each transition.

use chrono::{DateTime, Utc};
use common::{HoldId, HolderRef, TicketId, TierId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::status::TicketStatus;

/// One sellable slot within a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUnit {
    pub ticket_id: TicketId,
    pub tier_id: TierId,
    pub status: TicketStatus,

    /// Buyer the unit is held for, sold to or redeemed by.
    pub holder_ref: Option<HolderRef>,

    /// Hold that currently owns (or last sold) the unit.
    pub hold_id: Option<HoldId>,

    /// Present only while the unit is held.
    pub hold_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub sold_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl TicketUnit {
    /// Creates a fresh unit in `Available` status.
    pub fn new(tier_id: TierId, created_at: DateTime<Utc>) -> Self {
        Self {
            ticket_id: TicketId::new(),
            tier_id,
            status: TicketStatus::Available,
            holder_ref: None,
            hold_id: None,
            hold_expires_at: None,
            created_at,
            sold_at: None,
            redeemed_at: None,
        }
    }

    /// Returns true if the unit's current state satisfies a compare-and-set
    /// guard.
    ///
    /// When leaving `Held`, a hold id in `metadata` pins the owning hold: a
    /// unit re-held by a different hold does not match.
    pub fn matches(&self, expected: TicketStatus, metadata: &TransitionMetadata) -> bool {
        if self.status != expected {
            return false;
        }
        match (expected, metadata.hold_id) {
            (TicketStatus::Held, Some(hold_id)) => self.hold_id == Some(hold_id),
            _ => true,
        }
    }

    /// Moves the unit to `next`, stamping the fields that status carries.
    ///
    /// Callers are responsible for the compare-and-set guard; this only
    /// enforces the state machine.
    pub fn apply_transition(
        &mut self,
        next: TicketStatus,
        metadata: &TransitionMetadata,
    ) -> Result<(), DomainError> {
        self.status.ensure_transition(next)?;

        match next {
            TicketStatus::Held => {
                let (Some(holder_ref), Some(hold_id), Some(expires_at)) = (
                    metadata.holder_ref.clone(),
                    metadata.hold_id,
                    metadata.hold_expires_at,
                ) else {
                    return Err(DomainError::MissingHoldMetadata);
                };
                self.holder_ref = Some(holder_ref);
                self.hold_id = Some(hold_id);
                self.hold_expires_at = Some(expires_at);
            }
            TicketStatus::Sold => {
                self.sold_at = Some(metadata.at);
                self.hold_expires_at = None;
            }
            TicketStatus::Redeemed => {
                self.redeemed_at = Some(metadata.at);
            }
            TicketStatus::Released | TicketStatus::Available => {
                self.holder_ref = None;
                self.hold_id = None;
                self.hold_expires_at = None;
            }
        }

        self.status = next;
        Ok(())
    }
}

/// Data recorded alongside a status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionMetadata {
    /// When the transition happens.
    pub at: DateTime<Utc>,

    /// Hold performing the transition. Pins ownership when leaving `Held`,
    /// and is recorded when entering `Held`.
    pub hold_id: Option<HoldId>,

    /// Buyer to record when entering `Held`.
    pub holder_ref: Option<HolderRef>,

    /// Expiry to record when entering `Held`.
    pub hold_expires_at: Option<DateTime<Utc>>,
}

impl TransitionMetadata {
    /// Metadata carrying only a timestamp.
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            hold_id: None,
            holder_ref: None,
            hold_expires_at: None,
        }
    }

    /// Attaches the hold performing the transition.
    pub fn with_hold(mut self, hold_id: HoldId) -> Self {
        self.hold_id = Some(hold_id);
        self
    }

    /// Attaches the buyer and expiry recorded when a unit becomes held.
    pub fn with_holder(mut self, holder_ref: HolderRef, expires_at: DateTime<Utc>) -> Self {
        self.holder_ref = Some(holder_ref);
        self.hold_expires_at = Some(expires_at);
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn held_unit(hold_id: HoldId, now: DateTime<Utc>) -> TicketUnit {
        let mut unit = TicketUnit::new(TierId::new("floor"), now);
        let meta = TransitionMetadata::at(now)
            .with_hold(hold_id)
            .with_holder(HolderRef::new("buyer-1"), now + Duration::seconds(60));
        unit.apply_transition(TicketStatus::Held, &meta).unwrap();
        unit
    }

    #[test]
    fn test_hold_stamps_holder_and_expiry() {
        let now = Utc::now();
        let hold_id = HoldId::new();
        let unit = held_unit(hold_id, now);

        assert_eq!(unit.status, TicketStatus::Held);
        assert_eq!(unit.hold_id, Some(hold_id));
        assert_eq!(unit.holder_ref, Some(HolderRef::new("buyer-1")));
        assert_eq!(unit.hold_expires_at, Some(now + Duration::seconds(60)));
    }

    #[test]
    fn test_hold_without_holder_is_rejected() {
        let now = Utc::now();
        let mut unit = TicketUnit::new(TierId::new("floor"), now);
        let err = unit
            .apply_transition(
                TicketStatus::Held,
                &TransitionMetadata::at(now).with_hold(HoldId::new()),
            )
            .unwrap_err();
        assert_eq!(err, DomainError::MissingHoldMetadata);
        assert_eq!(unit.status, TicketStatus::Available);
    }

    #[test]
    fn test_sale_keeps_holder_and_clears_expiry() {
        let now = Utc::now();
        let hold_id = HoldId::new();
        let mut unit = held_unit(hold_id, now);

        unit.apply_transition(TicketStatus::Sold, &TransitionMetadata::at(now))
            .unwrap();

        assert_eq!(unit.sold_at, Some(now));
        assert_eq!(unit.hold_expires_at, None);
        assert_eq!(unit.holder_ref, Some(HolderRef::new("buyer-1")));
        assert_eq!(unit.hold_id, Some(hold_id));
    }

    #[test]
    fn test_release_clears_hold_fields() {
        let now = Utc::now();
        let mut unit = held_unit(HoldId::new(), now);

        unit.apply_transition(TicketStatus::Released, &TransitionMetadata::at(now))
            .unwrap();
        assert_eq!(unit.holder_ref, None);
        assert_eq!(unit.hold_id, None);
        assert_eq!(unit.hold_expires_at, None);

        unit.apply_transition(TicketStatus::Available, &TransitionMetadata::at(now))
            .unwrap();
        assert_eq!(unit.status, TicketStatus::Available);
    }

    #[test]
    fn test_guard_pins_owning_hold() {
        let now = Utc::now();
        let owner = HoldId::new();
        let unit = held_unit(owner, now);

        let owner_meta = TransitionMetadata::at(now).with_hold(owner);
        let stranger_meta = TransitionMetadata::at(now).with_hold(HoldId::new());

        assert!(unit.matches(TicketStatus::Held, &owner_meta));
        assert!(!unit.matches(TicketStatus::Held, &stranger_meta));
        assert!(!unit.matches(TicketStatus::Available, &owner_meta));
    }

    #[test]
    fn test_redeemed_unit_cannot_move() {
        let now = Utc::now();
        let mut unit = held_unit(HoldId::new(), now);
        let meta = TransitionMetadata::at(now);
        unit.apply_transition(TicketStatus::Sold, &meta).unwrap();
        unit.apply_transition(TicketStatus::Redeemed, &meta).unwrap();

        assert_eq!(unit.redeemed_at, Some(now));
        assert!(unit.apply_transition(TicketStatus::Redeemed, &meta).is_err());
        assert!(unit.apply_transition(TicketStatus::Available, &meta).is_err());
    }
}
