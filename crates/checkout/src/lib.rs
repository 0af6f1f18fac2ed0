//! Checkout: cart operations, payment verification and the order
//! committer.
//!
//! The commit sequence is: verify the payment signature, materialize an
//! immutable order from the cart snapshot, then persist order + coupon
//! redemption + cart clear as one atomic store operation. A retried
//! confirmation returns the already-committed order.

pub mod cart;
pub mod commit;
pub mod error;
pub mod verify;

pub use cart::{CartService, ProductDetails};
pub use commit::OrderCommitter;
pub use error::CheckoutError;
pub use verify::{HmacVerifier, PaymentConfirmation, PaymentVerifier};
