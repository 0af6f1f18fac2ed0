//! The mutable cart document.

use chrono::{DateTime, Utc};
use common::{CartId, CategoryId, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::coupon::AppliedCoupon;
use crate::error::DomainError;
use crate::pricing::compute_totals;

/// A cart belongs to exactly one registered user or one anonymous session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartOwner {
    User(UserId),
    Session(String),
}

impl CartOwner {
    /// Returns the user id when the cart belongs to a registered user.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            CartOwner::User(id) => Some(*id),
            CartOwner::Session(_) => None,
        }
    }
}

/// A line item in a cart.
///
/// Name, image, price, category and weight are captured at add time so
/// later catalog edits do not change what the shopper saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub selected_color: Option<String>,
    pub selected_size: Option<String>,
    pub category_id: Option<CategoryId>,
    pub weight_grams: Option<u32>,
}

/// Default per-item weight when the catalog does not specify one (500 g).
pub const DEFAULT_ITEM_WEIGHT_GRAMS: u32 = 500;

impl CartItem {
    /// Creates a new cart item with no variant selection.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            product_image: None,
            quantity,
            unit_price,
            selected_color: None,
            selected_size: None,
            category_id: None,
            weight_grams: None,
        }
    }

    /// Sets the selected color variant.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.selected_color = Some(color.into());
        self
    }

    /// Sets the selected size variant.
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.selected_size = Some(size.into());
        self
    }

    /// Sets the denormalized product image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.product_image = Some(image.into());
        self
    }

    /// Sets the catalog category.
    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category_id = Some(category);
        self
    }

    /// Sets the per-unit weight in grams.
    pub fn with_weight_grams(mut self, grams: u32) -> Self {
        self.weight_grams = Some(grams);
        self
    }

    /// Returns the total price for this line (quantity × unit price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// Per-unit weight, falling back to the default when unspecified.
    pub fn unit_weight_grams(&self) -> u32 {
        self.weight_grams.unwrap_or(DEFAULT_ITEM_WEIGHT_GRAMS)
    }

    /// Merge key: two lines merge only when product and both variant
    /// selections match.
    pub fn merge_key(&self) -> (&ProductId, Option<&str>, Option<&str>) {
        (
            &self.product_id,
            self.selected_color.as_deref(),
            self.selected_size.as_deref(),
        )
    }
}

/// The cart document.
///
/// Derived totals are recomputed on every mutation and are never stale
/// relative to the applied coupon: `total = max(0, subtotal - discount)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: CartOwner,
    pub items: Vec<CartItem>,
    pub coupon: Option<AppliedCoupon>,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub total: Money,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for the given owner.
    pub fn new(owner: CartOwner) -> Self {
        Self {
            id: CartId::new(),
            owner,
            items: Vec::new(),
            coupon: None,
            subtotal: Money::zero(),
            discount_amount: Money::zero(),
            total: Money::zero(),
            updated_at: Utc::now(),
        }
    }

    /// Returns true when the cart holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds an item, merging with an existing line when product and
    /// variant selections match. Totals are recomputed.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), DomainError> {
        if item.quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|line| line.merge_key() == item.merge_key())
        {
            existing.quantity += item.quantity;
        } else {
            self.items.push(item);
        }

        self.recalculate();
        Ok(())
    }

    /// Removes the line matching the given product and variant selection.
    /// Removing a line that is not present is a no-op.
    pub fn remove_item(
        &mut self,
        product_id: &ProductId,
        color: Option<&str>,
        size: Option<&str>,
    ) {
        self.items
            .retain(|line| line.merge_key() != (product_id, color, size));
        self.recalculate();
    }

    /// Attaches a validated coupon snapshot and recomputes totals.
    pub fn set_coupon(&mut self, coupon: AppliedCoupon) {
        self.coupon = Some(coupon);
        self.recalculate();
    }

    /// Drops the applied coupon and recomputes totals.
    pub fn remove_coupon(&mut self) {
        self.coupon = None;
        self.recalculate();
    }

    /// Empties the cart: items removed, coupon cleared, totals zeroed.
    pub fn clear(&mut self) {
        self.items.clear();
        self.coupon = None;
        self.recalculate();
    }

    /// Recomputes derived totals from the current items and coupon.
    ///
    /// Called by every mutating method; also safe to call directly after
    /// loading a document whose totals are suspect.
    pub fn recalculate(&mut self) {
        let discount = self.coupon.as_ref().map(|c| c.discount.clone());
        let totals = compute_totals(&self.items, discount.as_ref());

        self.subtotal = totals.subtotal;
        self.discount_amount = totals.discount_amount;
        self.total = totals.total;
        if let Some(coupon) = self.coupon.as_mut() {
            coupon.discount_amount = totals.discount_amount;
        }
        self.updated_at = Utc::now();
    }

    /// The set of catalog categories represented in the cart.
    pub fn category_ids(&self) -> HashSet<CategoryId> {
        self.items
            .iter()
            .filter_map(|item| item.category_id)
            .collect()
    }

    /// Total package weight: Σ(item weight × quantity), with the default
    /// per-item weight where the catalog left it unspecified.
    pub fn package_weight_grams(&self) -> u32 {
        self.items
            .iter()
            .map(|item| item.unit_weight_grams() * item.quantity)
            .sum()
    }
}
