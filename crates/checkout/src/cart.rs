//! Cart operations over the storefront store.

use chrono::Utc;
use common::{CartId, CategoryId, Money, ProductId};
use domain::{AppliedCoupon, Cart, CartItem, CartOwner};

use store::StorefrontStore;

use crate::error::CheckoutError;

/// Catalog fields resolved by the caller before an item enters the cart.
///
/// The catalog itself is outside this subsystem; these are the values it
/// must supply, captured onto the line item at add time.
#[derive(Debug, Clone)]
pub struct ProductDetails {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub category_id: Option<CategoryId>,
    pub weight_grams: Option<u32>,
}

/// Service owning all cart mutations.
///
/// Every mutation recomputes totals through the pricing engine and
/// persists the whole document, so stored totals are never stale
/// relative to the items or the applied coupon.
pub struct CartService<S: StorefrontStore> {
    store: S,
}

impl<S: StorefrontStore> CartService<S> {
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds an item to the owner's cart, creating the cart lazily on
    /// first add. Lines with the same product and variant selection
    /// merge.
    #[tracing::instrument(skip(self, product))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product: ProductDetails,
        quantity: u32,
        color: Option<String>,
        size: Option<String>,
    ) -> Result<Cart, CheckoutError> {
        let mut cart = match self.store.find_cart_for_owner(owner).await? {
            Some(cart) => cart,
            None => Cart::new(owner.clone()),
        };

        let mut item = CartItem::new(product.product_id, product.name, quantity, product.unit_price);
        item.product_image = product.image;
        item.category_id = product.category_id;
        item.weight_grams = product.weight_grams;
        item.selected_color = color;
        item.selected_size = size;

        cart.add_item(item)?;
        self.store.upsert_cart(&cart).await?;
        Ok(cart)
    }

    /// Removes the line matching product and variant selection.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: &ProductId,
        color: Option<&str>,
        size: Option<&str>,
    ) -> Result<Cart, CheckoutError> {
        let mut cart = self.load(cart_id).await?;
        cart.remove_item(product_id, color, size);
        self.store.upsert_cart(&cart).await?;
        Ok(cart)
    }

    /// Validates a coupon code against the cart and applies it.
    ///
    /// The validated snapshot and the recomputed totals are persisted in
    /// one write. Re-applying the code already on the cart is rejected
    /// with `AlreadyApplied` rather than discounting twice.
    #[tracing::instrument(skip(self))]
    pub async fn apply_coupon(&self, cart_id: CartId, code: &str) -> Result<Cart, CheckoutError> {
        let mut cart = self.load(cart_id).await?;
        let code = code.trim().to_uppercase();

        if let Some(applied) = &cart.coupon
            && applied.code == code
        {
            return Err(domain::CouponError::AlreadyApplied.into());
        }

        let coupon = self
            .store
            .get_coupon(&code)
            .await?
            .ok_or(domain::CouponError::NotFound)?;

        coupon.validate(
            cart.subtotal,
            &cart.category_ids(),
            cart.owner.user_id(),
            Utc::now(),
        )?;

        cart.set_coupon(AppliedCoupon {
            coupon_id: coupon.id,
            code: coupon.code.clone(),
            discount: coupon.discount.clone(),
            discount_amount: Money::zero(), // filled by the recompute
            min_purchase: coupon.min_purchase,
        });
        self.store.upsert_cart(&cart).await?;

        tracing::info!(%cart_id, code = %coupon.code, "coupon applied");
        Ok(cart)
    }

    /// Empties the cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, cart_id: CartId) -> Result<Cart, CheckoutError> {
        let mut cart = self.load(cart_id).await?;
        cart.clear();
        self.store.upsert_cart(&cart).await?;
        Ok(cart)
    }

    /// Returns an immutable value copy of the cart for checkout. Later
    /// cart mutations cannot affect an order built from this snapshot.
    #[tracing::instrument(skip(self))]
    pub async fn snapshot_for_checkout(&self, cart_id: CartId) -> Result<Cart, CheckoutError> {
        self.load(cart_id).await
    }

    async fn load(&self, cart_id: CartId) -> Result<Cart, CheckoutError> {
        self.store
            .get_cart(cart_id)
            .await?
            .ok_or(CheckoutError::CartNotFound(cart_id))
    }
}
