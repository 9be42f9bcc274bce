//! Payment collaborator trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use domain::Money;

use crate::error::EngineError;

/// Outcome of a charge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// Funds captured.
    Approved { payment_id: String },
    /// The payment provider refused the charge.
    Declined { reason: String },
}

/// Trait for payment capture.
///
/// A decline is a normal outcome; `Err` is reserved for the service itself
/// failing.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges `amount` against the buyer's payment reference.
    async fn charge(&self, payment_ref: &str, amount: Money) -> Result<ChargeOutcome, EngineError>;

    /// Refunds a previously captured payment.
    async fn refund(&self, payment_id: &str) -> Result<(), EngineError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, (String, Money)>,
    refunded: Vec<String>,
    declined_refs: HashSet<String>,
    next_id: u32,
    decline_all: bool,
    fail_on_refund: bool,
}

/// In-memory payment service that approves everything unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<Mutex<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryPaymentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declines every charge while set.
    pub fn set_decline_all(&self, decline: bool) {
        self.state().decline_all = decline;
    }

    /// Declines charges made with this payment reference.
    pub fn decline_ref(&self, payment_ref: impl Into<String>) {
        self.state().declined_refs.insert(payment_ref.into());
    }

    /// Makes refunds fail with a service error while set.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state().fail_on_refund = fail;
    }

    /// Returns the number of captured, unrefunded payments.
    pub fn payment_count(&self) -> usize {
        self.state().payments.len()
    }

    /// Returns the number of refunds issued.
    pub fn refund_count(&self) -> usize {
        self.state().refunded.len()
    }

    /// Returns true if a captured payment exists with the given ID.
    pub fn has_payment(&self, payment_id: &str) -> bool {
        self.state().payments.contains_key(payment_id)
    }

    /// Returns the amount captured for a payment.
    pub fn amount_for(&self, payment_id: &str) -> Option<Money> {
        self.state().payments.get(payment_id).map(|(_, amount)| *amount)
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn charge(&self, payment_ref: &str, amount: Money) -> Result<ChargeOutcome, EngineError> {
        let mut state = self.state();

        if state.decline_all || state.declined_refs.contains(payment_ref) {
            return Ok(ChargeOutcome::Declined {
                reason: "card declined".to_string(),
            });
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state
            .payments
            .insert(payment_id.clone(), (payment_ref.to_string(), amount));

        Ok(ChargeOutcome::Approved { payment_id })
    }

    async fn refund(&self, payment_id: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        if state.fail_on_refund {
            return Err(EngineError::PaymentService(format!(
                "refund of {payment_id} rejected"
            )));
        }
        if state.payments.remove(payment_id).is_some() {
            state.refunded.push(payment_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn charge_and_refund() {
        let service = InMemoryPaymentService::new();

        let outcome = service
            .charge("card-1", Money::from_cents(5000))
            .await
            .unwrap();
        let ChargeOutcome::Approved { payment_id } = outcome else {
            panic!("expected approval");
        };
        assert!(payment_id.starts_with("PAY-"));
        assert_eq!(service.payment_count(), 1);
        assert_eq!(service.amount_for(&payment_id), Some(Money::from_cents(5000)));

        service.refund(&payment_id).await.unwrap();
        assert_eq!(service.payment_count(), 0);
        assert_eq!(service.refund_count(), 1);
    }

    #[tokio::test]
    async fn declined_reference_is_not_an_error() {
        let service = InMemoryPaymentService::new();
        service.decline_ref("bad-card");

        let outcome = service
            .charge("bad-card", Money::from_cents(100))
            .await
            .unwrap();
        assert!(matches!(outcome, ChargeOutcome::Declined { .. }));
        assert_eq!(service.payment_count(), 0);

        let ok = service
            .charge("good-card", Money::from_cents(100))
            .await
            .unwrap();
        assert!(matches!(ok, ChargeOutcome::Approved { .. }));
    }

    #[tokio::test]
    async fn sequential_payment_ids() {
        let service = InMemoryPaymentService::new();

        let r1 = service.charge("a", Money::from_cents(1)).await.unwrap();
        let r2 = service.charge("a", Money::from_cents(1)).await.unwrap();

        assert_eq!(
            r1,
            ChargeOutcome::Approved {
                payment_id: "PAY-0001".to_string()
            }
        );
        assert_eq!(
            r2,
            ChargeOutcome::Approved {
                payment_id: "PAY-0002".to_string()
            }
        );
    }

    #[tokio::test]
    async fn refund_failure_surfaces_as_service_error() {
        let service = InMemoryPaymentService::new();
        service.set_fail_on_refund(true);

        let result = service.refund("PAY-0001").await;
        assert!(matches!(result, Err(EngineError::PaymentService(_))));
    }
}
