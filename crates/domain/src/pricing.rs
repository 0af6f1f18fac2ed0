//! The pricing engine.
//!
//! The single place where cart and order totals are computed. Every code
//! path that needs a subtotal, discount amount, or total goes through
//! [`compute_totals`] so there is exactly one rounding and clamping rule.

use common::Money;
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::coupon::Discount;

/// The result of a totals computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub total: Money,
}

impl Totals {
    /// Totals for an empty cart.
    pub fn zero() -> Self {
        Self {
            subtotal: Money::zero(),
            discount_amount: Money::zero(),
            total: Money::zero(),
        }
    }
}

/// Computes subtotal, discount and total for a set of line items.
///
/// Pure and idempotent: the same inputs always yield the same output.
/// A percentage discount takes `value`% of the subtotal; a fixed discount
/// is capped at the subtotal. The total is floored at zero.
pub fn compute_totals(items: &[CartItem], discount: Option<&Discount>) -> Totals {
    let subtotal = items
        .iter()
        .fold(Money::zero(), |sum, item| sum + item.line_total());

    let discount_amount = match discount {
        Some(Discount::Percentage(value)) => subtotal.percent(*value).min(subtotal),
        Some(Discount::Fixed(value)) => (*value).min(subtotal),
        None => Money::zero(),
    };

    Totals {
        subtotal,
        discount_amount,
        total: subtotal.saturating_sub(discount_amount),
    }
}
