//! Checkout error types.

use common::{AddressId, CartId};
use domain::{CouponError, DomainError};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during cart operations and order commit.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Cart not found.
    #[error("cart not found: {0}")]
    CartNotFound(CartId),

    /// The cart has no items.
    #[error("cannot check out an empty cart")]
    EmptyCart,

    /// A referenced address does not exist.
    #[error("address not found: {0}")]
    AddressNotFound(AddressId),

    /// The supplied payment signature did not match.
    #[error("payment signature verification failed")]
    InvalidSignature,

    /// A coupon failed validation or redemption.
    #[error("{0}")]
    Coupon(#[from] CouponError),

    /// Domain-level rejection (bad quantity etc.).
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CouponRedemption(coupon) => CheckoutError::Coupon(coupon),
            other => CheckoutError::Store(other),
        }
    }
}
