//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use fulfillment::{CarrierConfig, CarrierGateway, HttpCarrierGateway, InMemoryCarrierGateway};
use store::{InMemoryAddressBook, MemoryStore, StorefrontStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S, G>(
    config: Config,
    store: S,
    gateway: G,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) where
    S: StorefrontStore + Clone + 'static,
    G: CarrierGateway + Clone + 'static,
{
    let addresses = Arc::new(InMemoryAddressBook::new());
    let state = api::build_state(store, gateway, addresses, &config);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let store = MemoryStore::new();

    match config.carrier_base_url.clone() {
        Some(base_url) => {
            let gateway = HttpCarrierGateway::new(CarrierConfig {
                base_url,
                email: config.carrier_email.clone(),
                password: config.carrier_password.clone(),
                pickup_location: config.carrier_pickup_location.clone(),
                pickup_pincode: config.carrier_pickup_pincode.clone(),
                timeout: config.carrier_timeout,
            })
            .expect("failed to build carrier client");
            serve(config, store, Arc::new(gateway), metrics_handle).await;
        }
        None => {
            tracing::warn!("CARRIER_BASE_URL unset, using in-memory carrier gateway");
            serve(config, store, InMemoryCarrierGateway::new(), metrics_handle).await;
        }
    }
}
