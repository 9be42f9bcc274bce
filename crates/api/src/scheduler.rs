//! Periodic expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use ledger::InventoryLedger;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::AppState;

/// Background task that calls `sweep_expired` on a fixed period.
pub struct SweepScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweepScheduler {
    /// Spawns the sweep loop. The first sweep runs immediately.
    pub fn spawn<L: InventoryLedger + Clone + 'static>(
        state: Arc<AppState<L>>,
        period: Duration,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(state, period, shutdown_rx));
        Self { shutdown, handle }
    }

    /// Signals the loop to stop and waits for an in-flight sweep to finish.
    pub async fn stop(self) {
        self.shutdown.send(true).ok();
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "sweep task panicked");
        }
    }
}

async fn run<L: InventoryLedger + Clone + 'static>(
    state: Arc<AppState<L>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    // A slow sweep must not cause a burst of catch-up sweeps
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(period_secs = period.as_secs(), "expiry sweep scheduled");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = state.engine.now();
                match state.engine.sweep_expired(now).await {
                    Ok(report) if report.is_empty() => tracing::debug!("sweep found nothing"),
                    Ok(report) => tracing::info!(
                        holds = report.holds_released,
                        units = report.units_released,
                        orphans = report.orphans_reclaimed,
                        stragglers = report.stragglers_reclaimed,
                        "sweep released expired holds"
                    ),
                    // The next tick retries
                    Err(e) => tracing::warn!(error = %e, kind = e.kind().as_str(), "sweep failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("expiry sweep stopped");
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use common::{HolderRef, TierId};
    use domain::{HoldStatus, Money};
    use engine::{EngineConfig, ManualClock};
    use ledger::InMemoryLedger;

    use super::*;

    #[tokio::test]
    async fn releases_expired_holds_until_stopped() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        ));
        let state = crate::create_state(InMemoryLedger::new(), EngineConfig::default(), clock.clone());
        let tier = TierId::new("ga");
        state
            .engine
            .create_event_tier(tier.clone(), 5, Money::from_cents(1000))
            .await
            .unwrap();
        let hold = state
            .engine
            .reserve(&tier, 2, HolderRef::new("alice"), Some(60))
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(61));

        let scheduler = SweepScheduler::spawn(state.clone(), Duration::from_millis(10));

        let mut released = false;
        for _ in 0..200 {
            let current = state.engine.get_hold(hold.hold_id).await.unwrap();
            if current.status == HoldStatus::Released {
                released = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        scheduler.stop().await;

        assert!(released, "scheduler should release the expired hold");
        assert_eq!(state.engine.available_count(&tier).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn stop_returns_promptly() {
        let state = crate::create_default_state(InMemoryLedger::new(), EngineConfig::default());
        let scheduler = SweepScheduler::spawn(state, Duration::from_secs(3600));
        tokio::time::timeout(Duration::from_secs(5), scheduler.stop())
            .await
            .expect("scheduler did not stop");
    }
}
