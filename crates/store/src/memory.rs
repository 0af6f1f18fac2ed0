//! In-memory store implementation for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CartId, OrderId, UserId};
use domain::{Cart, CartOwner, Coupon, CouponError, DeliveryInfo, Order, OrderStatus};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::store::{CouponRedemption, StorefrontStore};

#[derive(Debug, Default)]
struct MemoryState {
    carts: HashMap<CartId, Cart>,
    coupons: HashMap<String, Coupon>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory store implementation.
///
/// Holds all state behind a single lock so the checkout commit is
/// naturally atomic, mirroring the transaction the PostgreSQL backend
/// uses.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl StorefrontStore for MemoryStore {
    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>> {
        Ok(self.state.read().await.carts.get(&id).cloned())
    }

    async fn find_cart_for_owner(&self, owner: &CartOwner) -> Result<Option<Cart>> {
        Ok(self
            .state
            .read()
            .await
            .carts
            .values()
            .find(|cart| &cart.owner == owner)
            .cloned())
    }

    async fn upsert_cart(&self, cart: &Cart) -> Result<()> {
        self.state.write().await.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(self
            .state
            .read()
            .await
            .coupons
            .get(&code.to_uppercase())
            .cloned())
    }

    async fn put_coupon(&self, coupon: &Coupon) -> Result<()> {
        self.state
            .write()
            .await
            .coupons
            .insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn find_order_by_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|order| {
                order.payment_info.gateway_order_id == gateway_order_id
                    && order.payment_info.gateway_payment_id == gateway_payment_id
            })
            .cloned())
    }

    async fn find_order_by_awb(&self, awb_code: &str) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|order| order.delivery_info.awb_code.as_deref() == Some(awb_code))
            .cloned())
    }

    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .read()
            .await
            .orders
            .values()
            .filter(|order| order.user == Some(user))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_delivery(
        &self,
        id: OrderId,
        delivery: &DeliveryInfo,
        order_status: OrderStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        order.delivery_info = delivery.clone();
        order.order_status = order_status;
        Ok(())
    }

    #[tracing::instrument(skip(self, order, redemption), fields(order_id = %order.id))]
    async fn commit_checkout(
        &self,
        order: &Order,
        redemption: Option<CouponRedemption>,
        cart_id: CartId,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        // Uniqueness on the payment-id pair, checked under the same lock
        // that performs the mutations.
        let duplicate = state.orders.values().any(|existing| {
            existing.payment_info.gateway_order_id == order.payment_info.gateway_order_id
                && existing.payment_info.gateway_payment_id == order.payment_info.gateway_payment_id
        });
        if duplicate {
            return Err(StoreError::DuplicateOrder {
                gateway_order_id: order.payment_info.gateway_order_id.clone(),
                gateway_payment_id: order.payment_info.gateway_payment_id.clone(),
            });
        }

        // Conditional coupon redemption, validated before any mutation so
        // a failure leaves nothing half-applied.
        if let Some(redemption) = &redemption {
            let coupon = state
                .coupons
                .get(&redemption.code)
                .ok_or(StoreError::CouponRedemption(CouponError::NotFound))?;
            if coupon.is_exhausted() {
                return Err(StoreError::CouponRedemption(CouponError::Exhausted));
            }
            if let Some(user) = redemption.user
                && coupon.used_by.contains(&user)
            {
                return Err(StoreError::CouponRedemption(CouponError::AlreadyUsed));
            }
        }

        if let Some(redemption) = redemption {
            let coupon = state
                .coupons
                .get_mut(&redemption.code)
                .ok_or(StoreError::CouponRedemption(CouponError::NotFound))?;
            coupon.used_count += 1;
            if let Some(user) = redemption.user {
                coupon.used_by.insert(user);
            }
        }

        state.orders.insert(order.id, order.clone());

        if let Some(cart) = state.carts.get_mut(&cart_id) {
            cart.clear();
        }

        metrics::counter!("orders_committed_total").increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::{AddressId, Money};
    use domain::{Address, CartItem, Discount};

    fn address() -> Address {
        Address {
            name: "Asha Rao".to_string(),
            phone: "9000000000".to_string(),
            pincode: "560001".to_string(),
            state: "Karnataka".to_string(),
            city: "Bengaluru".to_string(),
            district: "Bengaluru Urban".to_string(),
            address_line1: "12 MG Road".to_string(),
            address_line2: None,
            landmark: None,
            address_type: None,
        }
    }

    fn cart_with_items(user: UserId) -> Cart {
        let mut cart = Cart::new(CartOwner::User(user));
        cart.add_item(CartItem::new(
            "SKU-001",
            "Widget",
            2,
            Money::from_rupees(1000),
        ))
        .unwrap();
        cart
    }

    fn coupon(code: &str) -> Coupon {
        let now = Utc::now();
        Coupon::new(
            code,
            Discount::Percentage(10),
            Money::zero(),
            now - Duration::days(1),
            now + Duration::days(1),
        )
    }

    fn order_for(cart: &Cart, payment: &str) -> Order {
        Order::materialize(
            cart,
            AddressId::new(),
            address(),
            AddressId::new(),
            address(),
            "order_gw",
            payment,
            None,
        )
    }

    #[tokio::test]
    async fn cart_roundtrip_and_owner_lookup() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let cart = cart_with_items(user);
        store.upsert_cart(&cart).await.unwrap();

        let loaded = store.get_cart(cart.id).await.unwrap().unwrap();
        assert_eq!(loaded, cart);

        let by_owner = store
            .find_cart_for_owner(&CartOwner::User(user))
            .await
            .unwrap();
        assert_eq!(by_owner.unwrap().id, cart.id);
    }

    #[tokio::test]
    async fn coupon_lookup_is_case_insensitive() {
        let store = MemoryStore::new();
        store.put_coupon(&coupon("SAVE10")).await.unwrap();

        assert!(store.get_coupon("save10").await.unwrap().is_some());
        assert!(store.get_coupon("SAVE10").await.unwrap().is_some());
        assert!(store.get_coupon("OTHER").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_checkout_is_atomic_unit() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let cart = cart_with_items(user);
        store.upsert_cart(&cart).await.unwrap();
        let c = coupon("SAVE10");
        store.put_coupon(&c).await.unwrap();

        let order = order_for(&cart, "pay_1");
        let redemption = CouponRedemption {
            coupon_id: c.id,
            code: c.code.clone(),
            user: Some(user),
        };
        store
            .commit_checkout(&order, Some(redemption), cart.id)
            .await
            .unwrap();

        // Order persisted, coupon incremented, cart cleared.
        assert!(store.get_order(order.id).await.unwrap().is_some());
        let updated = store.get_coupon("SAVE10").await.unwrap().unwrap();
        assert_eq!(updated.used_count, 1);
        assert!(updated.used_by.contains(&user));
        let cleared = store.get_cart(cart.id).await.unwrap().unwrap();
        assert!(cleared.is_empty());
        assert_eq!(cleared.total, Money::zero());
    }

    #[tokio::test]
    async fn duplicate_payment_pair_is_rejected() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let cart = cart_with_items(user);
        store.upsert_cart(&cart).await.unwrap();

        let order = order_for(&cart, "pay_1");
        store.commit_checkout(&order, None, cart.id).await.unwrap();

        let retry = order_for(&cart, "pay_1");
        let result = store.commit_checkout(&retry, None, cart.id).await;
        assert!(matches!(result, Err(StoreError::DuplicateOrder { .. })));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn exhausted_coupon_fails_commit_without_side_effects() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let cart = cart_with_items(user);
        store.upsert_cart(&cart).await.unwrap();

        let mut c = coupon("ONCE").with_max_uses(1);
        c.used_count = 1;
        store.put_coupon(&c).await.unwrap();

        let order = order_for(&cart, "pay_1");
        let redemption = CouponRedemption {
            coupon_id: c.id,
            code: c.code.clone(),
            user: Some(user),
        };
        let result = store.commit_checkout(&order, Some(redemption), cart.id).await;

        assert!(matches!(
            result,
            Err(StoreError::CouponRedemption(CouponError::Exhausted))
        ));
        // Nothing was applied: no order, cart untouched.
        assert_eq!(store.order_count().await, 0);
        let unchanged = store.get_cart(cart.id).await.unwrap().unwrap();
        assert!(!unchanged.is_empty());
    }

    #[tokio::test]
    async fn find_order_by_awb() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let cart = cart_with_items(user);
        store.upsert_cart(&cart).await.unwrap();

        let mut order = order_for(&cart, "pay_1");
        order.delivery_info.awb_code = Some("AWB-123".to_string());
        store.commit_checkout(&order, None, cart.id).await.unwrap();

        let found = store.find_order_by_awb("AWB-123").await.unwrap();
        assert_eq!(found.unwrap().id, order.id);
        assert!(store.find_order_by_awb("AWB-999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_for_user_most_recent_first() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let cart = cart_with_items(user);
        store.upsert_cart(&cart).await.unwrap();

        let first = order_for(&cart, "pay_1");
        store.commit_checkout(&first, None, cart.id).await.unwrap();
        let mut second = order_for(&cart, "pay_2");
        second.created_at = first.created_at + Duration::seconds(10);
        store.commit_checkout(&second, None, cart.id).await.unwrap();

        let orders = store.list_orders_for_user(user).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, second.id);
    }

    #[tokio::test]
    async fn update_delivery_mutates_only_delivery_state() {
        let store = MemoryStore::new();
        let user = UserId::new();
        let cart = cart_with_items(user);
        store.upsert_cart(&cart).await.unwrap();

        let order = order_for(&cart, "pay_1");
        store.commit_checkout(&order, None, cart.id).await.unwrap();

        let mut delivery = order.delivery_info.clone();
        delivery.shipment_id = Some("SHIP-1".to_string());
        store
            .update_delivery(order.id, &delivery, OrderStatus::Processing)
            .await
            .unwrap();

        let updated = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(updated.delivery_info.shipment_id.as_deref(), Some("SHIP-1"));
        assert_eq!(updated.order_status, OrderStatus::Processing);
        assert_eq!(updated.total_amount, order.total_amount);
    }
}
