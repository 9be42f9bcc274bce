//! HTTP service shell for the ticket reservation engine.
//!
//! Exposes tier, hold and ticket operations as REST endpoints, runs the
//! periodic expiry sweep, and publishes structured logs (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod scheduler;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use engine::{
    Clock, EngineConfig, InMemoryPaymentService, ReservationEngine, SystemClock,
    TracingNotificationService,
};
use ledger::InventoryLedger;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// The engine as wired by the service: simulated payments, log-only notifications.
pub type ServiceEngine<L> = ReservationEngine<L, InMemoryPaymentService, TracingNotificationService>;

/// Shared application state.
pub struct AppState<L> {
    pub engine: ServiceEngine<L>,
    /// Handle onto the simulated payment provider, shared with the engine.
    pub payment: InMemoryPaymentService,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L: InventoryLedger + Clone + 'static>(
    state: Arc<AppState<L>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/tiers", post(routes::tiers::create::<L>))
        .route("/tiers/{tier_id}", get(routes::tiers::get::<L>))
        .route("/tiers/{tier_id}/available", get(routes::tiers::available::<L>))
        .route("/tiers/{tier_id}/holds", post(routes::tiers::reserve::<L>))
        .route("/tiers/{tier_id}/verify", post(routes::tiers::verify::<L>))
        .route(
            "/holds/{hold_id}",
            get(routes::holds::get::<L>).delete(routes::holds::release::<L>),
        )
        .route("/holds/{hold_id}/extend", post(routes::holds::extend::<L>))
        .route("/holds/{hold_id}/purchase", post(routes::holds::purchase::<L>))
        .route("/tickets/{ticket_id}", get(routes::tickets::get::<L>))
        .route("/tickets/{ticket_id}/status", get(routes::tickets::status::<L>))
        .route("/tickets/{ticket_id}/redeem", post(routes::tickets::redeem::<L>))
        .route(
            "/holders/{holder_ref}/tickets",
            get(routes::tickets::for_holder::<L>),
        )
        .route("/admin/sweep", post(routes::admin::sweep::<L>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state on the system clock.
pub fn create_default_state<L: InventoryLedger + Clone + 'static>(
    ledger: L,
    config: EngineConfig,
) -> Arc<AppState<L>> {
    create_state(ledger, config, Arc::new(SystemClock))
}

/// Creates application state with an explicit clock.
pub fn create_state<L: InventoryLedger + Clone + 'static>(
    ledger: L,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
) -> Arc<AppState<L>> {
    let payment = InMemoryPaymentService::new();
    let engine = ReservationEngine::with_settings(
        ledger,
        payment.clone(),
        TracingNotificationService,
        config,
        clock,
    );
    Arc::new(AppState { engine, payment })
}
