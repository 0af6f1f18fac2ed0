//! Coupons and the validation rules for applying them.

use chrono::{DateTime, Utc};
use common::{CategoryId, CouponId, Money, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// The discount a coupon grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Discount {
    /// Percentage of the subtotal, at most 100.
    Percentage(u8),
    /// Flat amount, capped at the subtotal when applied.
    Fixed(Money),
}

/// Reasons a coupon cannot be applied. Each maps to a specific
/// user-visible rejection; validation short-circuits on the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("coupon not found")]
    NotFound,

    #[error("coupon is expired or not yet valid")]
    Expired,

    #[error("coupon usage limit reached")]
    Exhausted,

    #[error("coupon has already been used by this account")]
    AlreadyUsed,

    #[error("cart subtotal is below the coupon minimum of {0}")]
    BelowMinimum(Money),

    #[error("coupon does not apply to any item in the cart")]
    CategoryMismatch,

    #[error("coupon is already applied to this cart")]
    AlreadyApplied,
}

/// A coupon record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Unique, stored upper-cased.
    pub code: String,
    pub description: String,
    pub discount: Discount,
    pub min_purchase: Money,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// None means unlimited uses.
    pub max_uses: Option<u32>,
    pub used_count: u32,
    /// One redemption per user, lifetime.
    pub used_by: HashSet<UserId>,
    pub is_active: bool,
    /// Empty means no category restriction.
    pub applicable_categories: Vec<CategoryId>,
}

impl Coupon {
    /// Creates an active coupon with the code normalized to upper case
    /// and percentage discounts clamped to 100.
    pub fn new(
        code: impl Into<String>,
        discount: Discount,
        min_purchase: Money,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        let discount = match discount {
            Discount::Percentage(value) => Discount::Percentage(value.min(100)),
            fixed => fixed,
        };
        Self {
            id: CouponId::new(),
            code: code.into().trim().to_uppercase(),
            description: String::new(),
            discount,
            min_purchase,
            valid_from,
            valid_until,
            max_uses: None,
            used_count: 0,
            used_by: HashSet::new(),
            is_active: true,
            applicable_categories: Vec::new(),
        }
    }

    /// Caps the number of redemptions.
    pub fn with_max_uses(mut self, max_uses: u32) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    /// Restricts the coupon to carts containing at least one item from
    /// the given categories.
    pub fn with_categories(mut self, categories: Vec<CategoryId>) -> Self {
        self.applicable_categories = categories;
        self
    }

    /// Returns true when the usage cap has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.max_uses
            .is_some_and(|max| self.used_count >= max)
    }

    /// Validates this coupon against a cart, short-circuiting on the
    /// first failed check.
    ///
    /// Check order: active → validity window → usage cap → one-per-user →
    /// minimum purchase → category restriction.
    pub fn validate(
        &self,
        cart_subtotal: Money,
        cart_categories: &HashSet<CategoryId>,
        user: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::NotFound);
        }
        if now < self.valid_from || now > self.valid_until {
            return Err(CouponError::Expired);
        }
        if self.is_exhausted() {
            return Err(CouponError::Exhausted);
        }
        if let Some(user) = user
            && self.used_by.contains(&user)
        {
            return Err(CouponError::AlreadyUsed);
        }
        if cart_subtotal < self.min_purchase {
            return Err(CouponError::BelowMinimum(self.min_purchase));
        }
        if !self.applicable_categories.is_empty()
            && !self
                .applicable_categories
                .iter()
                .any(|c| cart_categories.contains(c))
        {
            return Err(CouponError::CategoryMismatch);
        }
        Ok(())
    }
}

/// The coupon state carried on a cart once validated.
///
/// `discount_amount` is kept in lockstep with the cart totals by the
/// pricing recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount: Discount,
    pub discount_amount: Money,
    pub min_purchase: Money,
}

/// The immutable coupon snapshot frozen onto a committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponSnapshot {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount: Discount,
    pub discount_amount: Money,
}

impl From<&AppliedCoupon> for CouponSnapshot {
    fn from(applied: &AppliedCoupon) -> Self {
        Self {
            coupon_id: applied.coupon_id,
            code: applied.code.clone(),
            discount: applied.discount.clone(),
            discount_amount: applied.discount_amount,
        }
    }
}
