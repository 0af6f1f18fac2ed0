//! Domain layer for the order-commit and fulfillment pipeline.
//!
//! Pure data types and calculations: carts with recompute-on-mutation
//! totals, the pricing engine, coupon validation, and the order model
//! with payment and delivery state. No I/O happens here.

pub mod cart;
pub mod coupon;
pub mod error;
pub mod order;
pub mod pricing;

pub use cart::{Cart, CartItem, CartOwner};
pub use coupon::{AppliedCoupon, Coupon, CouponError, CouponSnapshot, Discount};
pub use error::DomainError;
pub use order::{
    Address, DeliveryInfo, DeliveryStatus, Order, OrderItem, OrderStatus, PaymentInfo,
    PaymentStatus, TrackingEvent,
};
pub use pricing::{Totals, compute_totals};
