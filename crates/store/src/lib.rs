//! Persistence for carts, coupons and orders.
//!
//! A single [`StorefrontStore`] trait with two backends: an in-memory
//! implementation for tests and a PostgreSQL implementation backed by
//! `sqlx`. The checkout commit (order insert + coupon redemption + cart
//! clear) is a single atomic store operation in both backends.

pub mod address;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use address::{AddressBook, InMemoryAddressBook};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{CouponRedemption, StorefrontStore};
