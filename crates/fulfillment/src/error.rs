//! Fulfillment error types.

use common::OrderId;
use store::StoreError;
use thiserror::Error;

/// Errors raised by the carrier gateway and the orchestration layer.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Carrier authentication failed.
    #[error("carrier authentication failed: {0}")]
    Auth(String),

    /// The carrier rejected or failed a booking call.
    #[error("carrier call failed: {0}")]
    Carrier(String),

    /// No courier serves the destination pincode.
    #[error("no courier available for pincode {pincode}")]
    NotServiceable { pincode: String },

    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Shipment booking requires a paid order.
    #[error("order {0} is not paid")]
    NotPaid(OrderId),

    /// Tracking was requested for an order with no AWB assigned.
    #[error("order {0} has no AWB code")]
    MissingAwb(OrderId),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Transport-level HTTP failure.
    #[error("carrier http error: {0}")]
    Http(#[from] reqwest::Error),
}
