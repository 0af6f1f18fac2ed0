//! HTTP storefront API.
//!
//! Exposes the payment-confirmation webhook, cart and coupon endpoints,
//! and order listing with live tracking, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use checkout::{CartService, HmacVerifier, OrderCommitter};
use fulfillment::{
    CarrierGateway, InMemoryCarrierGateway, OrchestratorConfig, ShipmentOrchestrator,
    TrackingReconciler,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{AddressBook, InMemoryAddressBook, MemoryStore, StorefrontStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: StorefrontStore, G: CarrierGateway> {
    pub carts: CartService<S>,
    pub committer: OrderCommitter<S, HmacVerifier>,
    pub orchestrator: ShipmentOrchestrator<S, G>,
    pub reconciler: TrackingReconciler<S, G>,
    pub store: S,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, G>(state: Arc<AppState<S, G>>, metrics_handle: PrometheusHandle) -> Router
where
    S: StorefrontStore + Clone + 'static,
    G: CarrierGateway + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout/confirm", post(routes::checkout::confirm::<S, G>))
        .route("/carts/items", post(routes::carts::add_item::<S, G>))
        .route("/carts/{id}/items", delete(routes::carts::remove_item::<S, G>))
        .route("/carts/{id}/coupon", post(routes::carts::apply_coupon::<S, G>))
        .route("/orders", get(routes::orders::list::<S, G>))
        .route("/orders/{id}", get(routes::orders::get::<S, G>))
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

/// Wires up application state over the given store, carrier gateway and
/// address book.
pub fn build_state<S, G>(
    store: S,
    gateway: G,
    addresses: Arc<dyn AddressBook>,
    config: &Config,
) -> Arc<AppState<S, G>>
where
    S: StorefrontStore + Clone + 'static,
    G: CarrierGateway + Clone + 'static,
{
    let verifier = HmacVerifier::new(config.payment_webhook_secret.clone());
    let orchestrator_config = OrchestratorConfig {
        pickup_pincode: config.carrier_pickup_pincode.clone(),
        label_attempts: config.label_retry_attempts,
        label_base_delay: config.label_retry_base,
        ..OrchestratorConfig::default()
    };

    Arc::new(AppState {
        carts: CartService::new(store.clone()),
        committer: OrderCommitter::new(store.clone(), addresses, verifier),
        orchestrator: ShipmentOrchestrator::new(store.clone(), gateway.clone(), orchestrator_config),
        reconciler: TrackingReconciler::new(store.clone(), gateway),
        store,
    })
}

/// Creates default in-memory application state, returning the backing
/// store, gateway and address book for seeding.
pub fn create_default_state(
    config: &Config,
) -> (
    Arc<AppState<MemoryStore, InMemoryCarrierGateway>>,
    MemoryStore,
    InMemoryCarrierGateway,
    Arc<InMemoryAddressBook>,
) {
    let store = MemoryStore::new();
    let gateway = InMemoryCarrierGateway::new();
    let addresses = Arc::new(InMemoryAddressBook::new());
    let state = build_state(store.clone(), gateway.clone(), addresses.clone(), config);
    (state, store, gateway, addresses)
}
