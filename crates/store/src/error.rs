//! Store error types.

use common::{CartId, OrderId};
use domain::CouponError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Cart not found.
    #[error("cart not found: {0}")]
    CartNotFound(CartId),

    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order already exists for this payment confirmation. The unique
    /// constraint on the payment-id pair makes duplicate commits
    /// structurally impossible rather than merely checked.
    #[error("order already committed for payment {gateway_payment_id} on {gateway_order_id}")]
    DuplicateOrder {
        gateway_order_id: String,
        gateway_payment_id: String,
    },

    /// The conditional coupon redemption failed (cap reached or user
    /// already redeemed).
    #[error("coupon redemption failed: {0}")]
    CouponRedemption(#[from] CouponError),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
