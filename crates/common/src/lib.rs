//! Shared types used across the storefront pipeline.

pub mod ids;
pub mod money;

pub use ids::{AddressId, CartId, CategoryId, CouponId, OrderId, ProductId, UserId};
pub use money::Money;
