//! Shipment fulfillment: carrier gateway, booking orchestration and
//! tracking reconciliation.
//!
//! Booking is best-effort relative to payment: once an order is paid,
//! no fulfillment failure ever rolls that back. Progress is persisted
//! step by step so a failed booking can be resumed.

pub mod client;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod reconciler;

pub use client::{CarrierConfig, HttpCarrierGateway};
pub use error::FulfillmentError;
pub use gateway::{
    AwbAssignment, CarrierGateway, CarrierTrackingEvent, CourierOffer, CreatedShipment,
    InMemoryCarrierGateway, ShippingLabel, TrackingSnapshot,
};
pub use orchestrator::{OrchestratorConfig, ShipmentOrchestrator};
pub use reconciler::TrackingReconciler;
