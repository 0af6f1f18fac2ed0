//! The order committer.

use std::sync::Arc;

use common::AddressId;
use domain::{Cart, Order};
use store::{AddressBook, CouponRedemption, StoreError, StorefrontStore};

use crate::error::CheckoutError;
use crate::verify::{PaymentConfirmation, PaymentVerifier};

/// Turns a paid cart into a committed order.
///
/// Commit order: verify the signature, check for an already-committed
/// order for this payment, resolve addresses, then hand the materialized
/// order to the store for the atomic commit. The store's uniqueness
/// constraint on the payment-id pair closes the race between two
/// concurrent confirmations; the loser fetches and returns the winner's
/// order.
pub struct OrderCommitter<S: StorefrontStore, V: PaymentVerifier> {
    store: S,
    addresses: Arc<dyn AddressBook>,
    verifier: V,
}

impl<S: StorefrontStore, V: PaymentVerifier> OrderCommitter<S, V> {
    /// Creates a committer over the given store, address book and
    /// payment verifier.
    pub fn new(store: S, addresses: Arc<dyn AddressBook>, verifier: V) -> Self {
        Self {
            store,
            addresses,
            verifier,
        }
    }

    /// Commits a checkout.
    ///
    /// Idempotent on the payment-id pair: a retried confirmation returns
    /// the order committed the first time, with no further side effects.
    /// An invalid signature rejects before anything is read or written.
    #[tracing::instrument(skip(self, cart, confirmation), fields(cart_id = %cart.id))]
    pub async fn commit(
        &self,
        cart: &Cart,
        confirmation: &PaymentConfirmation,
        billing_address_id: AddressId,
        shipping_address_id: AddressId,
    ) -> Result<Order, CheckoutError> {
        self.verifier.verify(confirmation)?;

        // The retry lookup must run before any cart precondition: the
        // first commit clears the cart, so a retried confirmation
        // arrives with an empty cart and still deserves the committed
        // order back.
        if let Some(existing) = self
            .store
            .find_order_by_payment(&confirmation.gateway_order_id, &confirmation.gateway_payment_id)
            .await?
        {
            tracing::info!(order_id = %existing.id, "confirmation retry, returning committed order");
            metrics::counter!("checkout_retries_total").increment(1);
            return Ok(existing);
        }

        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let billing_address = self
            .addresses
            .get_address(billing_address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound(billing_address_id))?;
        let shipping_address = self
            .addresses
            .get_address(shipping_address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound(shipping_address_id))?;

        let order = Order::materialize(
            cart,
            billing_address_id,
            billing_address,
            shipping_address_id,
            shipping_address,
            &confirmation.gateway_order_id,
            &confirmation.gateway_payment_id,
            None,
        );

        let redemption = cart.coupon.as_ref().map(|applied| CouponRedemption {
            coupon_id: applied.coupon_id,
            code: applied.code.clone(),
            user: cart.owner.user_id(),
        });

        match self.store.commit_checkout(&order, redemption, cart.id).await {
            Ok(()) => {
                tracing::info!(order_id = %order.id, total = %order.total_amount, "order committed");
                Ok(order)
            }
            // Lost a commit race; the winner's order is the answer.
            Err(StoreError::DuplicateOrder { .. }) => {
                let existing = self
                    .store
                    .find_order_by_payment(
                        &confirmation.gateway_order_id,
                        &confirmation.gateway_payment_id,
                    )
                    .await?;
                match existing {
                    Some(order) => Ok(order),
                    None => Err(StoreError::DuplicateOrder {
                        gateway_order_id: confirmation.gateway_order_id.clone(),
                        gateway_payment_id: confirmation.gateway_payment_id.clone(),
                    }
                    .into()),
                }
            }
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::{Money, UserId};
    use domain::{Address, CartItem, CartOwner, Coupon, Discount, PaymentStatus};
    use secrecy::SecretString;
    use store::{InMemoryAddressBook, MemoryStore};

    use crate::verify::HmacVerifier;

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

    struct Fixture {
        store: MemoryStore,
        committer: OrderCommitter<MemoryStore, HmacVerifier>,
        verifier: HmacVerifier,
        billing: AddressId,
        shipping: AddressId,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let book = InMemoryAddressBook::new();
        let billing = book.insert(address()).await;
        let shipping = book.insert(address()).await;
        let verifier = HmacVerifier::new(SecretString::from("test-secret"));
        let committer = OrderCommitter::new(store.clone(), Arc::new(book), verifier.clone());
        Fixture {
            store,
            committer,
            verifier,
            billing,
            shipping,
        }
    }

    fn signed(verifier: &HmacVerifier, order: &str, payment: &str) -> PaymentConfirmation {
        PaymentConfirmation {
            gateway_order_id: order.to_string(),
            gateway_payment_id: payment.to_string(),
            signature: verifier.sign(order, payment),
        }
    }

    async fn cart_with_coupon(store: &MemoryStore, user: UserId) -> Cart {
        let now = Utc::now();
        let coupon = Coupon::new(
            "SAVE10",
            Discount::Percentage(10),
            Money::from_rupees(500),
            now - Duration::days(1),
            now + Duration::days(1),
        );
        store.put_coupon(&coupon).await.unwrap();

        let mut cart = Cart::new(CartOwner::User(user));
        cart.add_item(CartItem::new(
            "SKU-001",
            "Widget",
            2,
            Money::from_rupees(1000),
        ))
        .unwrap();
        cart.set_coupon(domain::AppliedCoupon {
            coupon_id: coupon.id,
            code: coupon.code.clone(),
            discount: coupon.discount.clone(),
            discount_amount: Money::zero(),
            min_purchase: coupon.min_purchase,
        });
        store.upsert_cart(&cart).await.unwrap();
        cart
    }

    #[tokio::test]
    async fn commit_freezes_discounted_totals_and_redeems_coupon() {
        let f = fixture().await;
        let user = UserId::new();
        let cart = cart_with_coupon(&f.store, user).await;

        let confirmation = signed(&f.verifier, "order_1", "pay_1");
        let order = f
            .committer
            .commit(&cart, &confirmation, f.billing, f.shipping)
            .await
            .unwrap();

        // ₹2000 subtotal, 10% off.
        assert_eq!(order.total_amount, Money::from_rupees(1800));
        assert_eq!(order.coupon_used.as_ref().unwrap().discount_amount, Money::from_rupees(200));
        assert_eq!(order.payment_info.status, PaymentStatus::Paid);

        let coupon = f.store.get_coupon("SAVE10").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);
        assert!(coupon.used_by.contains(&user));

        let cleared = f.store.get_cart(cart.id).await.unwrap().unwrap();
        assert!(cleared.is_empty());
    }

    #[tokio::test]
    async fn retried_confirmation_returns_same_order() {
        let f = fixture().await;
        let cart = cart_with_coupon(&f.store, UserId::new()).await;
        let confirmation = signed(&f.verifier, "order_1", "pay_1");

        let first = f
            .committer
            .commit(&cart, &confirmation, f.billing, f.shipping)
            .await
            .unwrap();
        let second = f
            .committer
            .commit(&cart, &confirmation, f.billing, f.shipping)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(f.store.order_count().await, 1);
        // The coupon was redeemed exactly once.
        let coupon = f.store.get_coupon("SAVE10").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);
    }

    #[tokio::test]
    async fn retry_after_cart_cleared_returns_committed_order() {
        let f = fixture().await;
        let cart = cart_with_coupon(&f.store, UserId::new()).await;
        let confirmation = signed(&f.verifier, "order_1", "pay_1");

        let first = f
            .committer
            .commit(&cart, &confirmation, f.billing, f.shipping)
            .await
            .unwrap();

        // The commit cleared the cart; a webhook retry re-reads it and
        // presents the now-empty snapshot.
        let cleared = f.store.get_cart(cart.id).await.unwrap().unwrap();
        assert!(cleared.is_empty());
        let second = f
            .committer
            .commit(&cleared, &confirmation, f.billing, f.shipping)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(f.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn invalid_signature_leaves_everything_untouched() {
        let f = fixture().await;
        let cart = cart_with_coupon(&f.store, UserId::new()).await;

        let confirmation = PaymentConfirmation {
            gateway_order_id: "order_1".to_string(),
            gateway_payment_id: "pay_1".to_string(),
            signature: f.verifier.sign("order_1", "pay_other"),
        };
        let result = f
            .committer
            .commit(&cart, &confirmation, f.billing, f.shipping)
            .await;

        assert!(matches!(result, Err(CheckoutError::InvalidSignature)));
        assert_eq!(f.store.order_count().await, 0);
        let coupon = f.store.get_coupon("SAVE10").await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 0);
        let cart = f.store.get_cart(cart.id).await.unwrap().unwrap();
        assert!(!cart.is_empty());
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let f = fixture().await;
        let cart = Cart::new(CartOwner::Session("sess-1".to_string()));
        let confirmation = signed(&f.verifier, "order_1", "pay_1");

        let result = f
            .committer
            .commit(&cart, &confirmation, f.billing, f.shipping)
            .await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn unknown_address_is_rejected_before_commit() {
        let f = fixture().await;
        let cart = cart_with_coupon(&f.store, UserId::new()).await;
        let confirmation = signed(&f.verifier, "order_1", "pay_1");

        let result = f
            .committer
            .commit(&cart, &confirmation, AddressId::new(), f.shipping)
            .await;
        assert!(matches!(result, Err(CheckoutError::AddressNotFound(_))));
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn guest_checkout_commits_without_user() {
        let f = fixture().await;
        let mut cart = Cart::new(CartOwner::Session("sess-9".to_string()));
        cart.add_item(CartItem::new(
            "SKU-001",
            "Widget",
            1,
            Money::from_rupees(750),
        ))
        .unwrap();
        f.store.upsert_cart(&cart).await.unwrap();

        let confirmation = signed(&f.verifier, "order_g", "pay_g");
        let order = f
            .committer
            .commit(&cart, &confirmation, f.billing, f.shipping)
            .await
            .unwrap();

        assert!(order.user.is_none());
        assert_eq!(order.total_amount, Money::from_rupees(750));
    }
}
