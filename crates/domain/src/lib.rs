//! Domain model for the ticket reservation engine.
//!
//! This crate holds the pure, IO-free parts of the system:
//! - `TicketStatus` lifecycle state machine
//! - `TicketUnit`, `Tier` and `Hold` records
//! - `TicketEvent` notification payloads
//! - `Money` value object

pub mod error;
pub mod events;
pub mod hold;
pub mod money;
pub mod status;
pub mod ticket;
pub mod tier;

pub use common::{HoldId, HolderRef, TicketId, TierId};
pub use error::DomainError;
pub use events::{
    HoldReleasedData, ReleaseReason, TicketEvent, TicketRedeemedData, TicketsPurchasedData,
};
pub use hold::{Hold, HoldStatus};
pub use money::Money;
pub use status::TicketStatus;
pub use ticket::{TicketUnit, TransitionMetadata};
pub use tier::{StatusCounts, Tier};
