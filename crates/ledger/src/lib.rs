//! Inventory ledger for the ticket reservation engine.
//!
//! The ledger is the single shared mutable resource of the system. Every
//! status change goes through [`InventoryLedger::try_transition`], an atomic
//! compare-and-set on one ticket unit; nothing reads a status and then
//! writes unconditionally.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{HoldId, HolderRef, TicketId, TierId};
pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use query::UnitQuery;
pub use store::{InventoryLedger, InventoryLedgerExt};
