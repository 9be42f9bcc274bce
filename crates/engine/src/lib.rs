//! Ticket reservation engine.
//!
//! Coordinates the lifecycle of ticket units over an [`ledger::InventoryLedger`]:
//! 1. Reserve: hold N available units under a time-bounded lease
//! 2. Purchase: charge the buyer and move the held units to sold
//! 3. Redeem: check a sold ticket in, exactly once
//!
//! Holds that run out are released by `sweep_expired`, which an external
//! scheduler calls periodically. Every unit mutation is a per-unit
//! compare-and-set, so concurrent callers never oversell a tier.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod hold_manager;
pub mod integrity;
pub mod purchase;
pub mod redemption;
pub mod services;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{ReservationEngine, TierSummary};
pub use error::{EngineError, ErrorKind};
pub use hold_manager::{HoldManager, SweepReport};
pub use integrity::IntegrityGuard;
pub use purchase::{PurchaseCoordinator, PurchaseReceipt};
pub use redemption::RedemptionGate;
pub use services::{
    ChargeOutcome, InMemoryNotificationService, InMemoryPaymentService, NotificationService,
    PaymentService, TracingNotificationService,
};
