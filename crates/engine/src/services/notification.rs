//! Notification collaborator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use domain::TicketEvent;

use crate::error::EngineError;

/// Receives ticket lifecycle events after they commit.
///
/// Delivery is fire-and-forget: the engine logs a failure and moves on.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn notify(&self, event: TicketEvent) -> Result<(), EngineError>;
}

/// Records every event; used by tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    events: Arc<Mutex<Vec<TicketEvent>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every delivery fail while set.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of the events delivered so far.
    pub fn events(&self) -> Vec<TicketEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of delivered events of the given type.
    pub fn count_of(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn notify(&self, event: TicketEvent) -> Result<(), EngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::Notification(format!(
                "delivery of {} failed",
                event.event_type()
            )));
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

/// Hands an event to the collaborator, logging instead of failing.
pub(crate) async fn deliver<N: NotificationService + ?Sized>(notifier: &N, event: TicketEvent) {
    let event_type = event.event_type();
    if let Err(e) = notifier.notify(event).await {
        tracing::warn!(event_type, error = %e, "notification failed");
    }
}

/// Writes each event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationService;

#[async_trait]
impl NotificationService for TracingNotificationService {
    async fn notify(&self, event: TicketEvent) -> Result<(), EngineError> {
        tracing::info!(
            event_type = event.event_type(),
            tier_id = %event.tier_id(),
            "ticket event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use domain::{TicketRedeemedData, TicketId, TierId};

    use super::*;

    fn redeemed() -> TicketEvent {
        TicketEvent::TicketRedeemed(TicketRedeemedData {
            ticket_id: TicketId::new(),
            tier_id: TierId::new("ga"),
            holder_ref: None,
            redeemed_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn records_events_in_order() {
        let service = InMemoryNotificationService::new();
        service.notify(redeemed()).await.unwrap();
        service.notify(redeemed()).await.unwrap();

        assert_eq!(service.events().len(), 2);
        assert_eq!(service.count_of("TicketRedeemed"), 2);
        assert_eq!(service.count_of("TicketsPurchased"), 0);
    }

    #[tokio::test]
    async fn failure_switch_drops_events() {
        let service = InMemoryNotificationService::new();
        service.set_fail(true);

        assert!(service.notify(redeemed()).await.is_err());
        assert!(service.events().is_empty());
    }
}
