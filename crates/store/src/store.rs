//! The storefront persistence trait.

use async_trait::async_trait;
use common::{CartId, CouponId, OrderId, UserId};
use domain::{Cart, CartOwner, Coupon, DeliveryInfo, Order, OrderStatus};

use crate::error::Result;

/// A pending coupon redemption, applied atomically with the checkout
/// commit.
#[derive(Debug, Clone)]
pub struct CouponRedemption {
    pub coupon_id: CouponId,
    pub code: String,
    /// Marked in `used_by` only when the shopper is a known user.
    pub user: Option<UserId>,
}

/// Persistent storage for carts, coupons and orders.
///
/// Orders are additionally indexed by the gateway payment-id pair (for
/// idempotent commits) and by AWB code (for reconciliation lookups).
#[async_trait]
pub trait StorefrontStore: Send + Sync {
    // -- Carts --

    /// Loads a cart by id.
    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>>;

    /// Finds the cart owned by the given user or session, if any.
    async fn find_cart_for_owner(&self, owner: &CartOwner) -> Result<Option<Cart>>;

    /// Creates or replaces a cart document.
    async fn upsert_cart(&self, cart: &Cart) -> Result<()>;

    // -- Coupons --

    /// Loads a coupon by its (upper-cased) code.
    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>>;

    /// Creates or replaces a coupon record.
    async fn put_coupon(&self, coupon: &Coupon) -> Result<()>;

    // -- Orders --

    /// Loads an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Idempotency lookup: the order committed for a payment-id pair.
    async fn find_order_by_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>>;

    /// Reconciliation lookup: the order carrying an AWB code.
    async fn find_order_by_awb(&self, awb_code: &str) -> Result<Option<Order>>;

    /// All orders placed by a user, most recent first.
    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>>;

    /// Persists updated delivery progress and order status. The only
    /// mutation allowed on a paid order.
    async fn update_delivery(
        &self,
        id: OrderId,
        delivery: &DeliveryInfo,
        order_status: OrderStatus,
    ) -> Result<()>;

    /// The atomic checkout commit: persists the order, applies the
    /// coupon redemption (conditional on the usage cap and one-per-user
    /// rule) and clears the cart, all as a unit. Either everything is
    /// visible afterwards or nothing is.
    ///
    /// Fails with [`StoreError::DuplicateOrder`] when an order already
    /// exists for the same payment-id pair.
    ///
    /// [`StoreError::DuplicateOrder`]: crate::error::StoreError::DuplicateOrder
    async fn commit_checkout(
        &self,
        order: &Order,
        redemption: Option<CouponRedemption>,
        cart_id: CartId,
    ) -> Result<()>;
}
