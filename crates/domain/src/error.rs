//! Domain error types.

use thiserror::Error;

use crate::coupon::CouponError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A coupon failed validation.
    #[error("coupon error: {0}")]
    Coupon(#[from] CouponError),

    /// An item quantity below 1 was supplied.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// An operation required a non-empty cart.
    #[error("cart is empty")]
    EmptyCart,
}
