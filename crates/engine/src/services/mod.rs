//! External collaborator traits and in-memory implementations.

pub mod notification;
pub mod payment;

pub use notification::{InMemoryNotificationService, NotificationService, TracingNotificationService};
pub use payment::{ChargeOutcome, InMemoryPaymentService, PaymentService};
