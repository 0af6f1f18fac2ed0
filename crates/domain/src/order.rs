//! The immutable order record and its payment/delivery state.

use chrono::{DateTime, Utc};
use common::{AddressId, Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, DEFAULT_ITEM_WEIGHT_GRAMS};
use crate::coupon::CouponSnapshot;

/// An address snapshot. Copied by value onto orders at commit time so
/// later address-book edits never retroactively change past orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub phone: String,
    pub pincode: String,
    pub state: String,
    pub city: String,
    pub district: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub landmark: Option<String>,
    pub address_type: Option<String>,
}

/// Payment confirmation state on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

/// Gateway identifiers and status for the payment backing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub gateway_payment_id: String,
    pub gateway_order_id: String,
    pub status: PaymentStatus,
}

/// Canonical delivery status, mapped from carrier-specific codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Returned,
    Cancelled,
    Failed,
}

impl DeliveryStatus {
    /// Maps a carrier status code to the canonical status.
    /// Unknown codes fall back to Pending.
    pub fn from_carrier_code(code: u32) -> Self {
        match code {
            1 => DeliveryStatus::Pending,
            2 => DeliveryStatus::Processing,
            3 => DeliveryStatus::Shipped,
            4 => DeliveryStatus::InTransit,
            5 => DeliveryStatus::OutForDelivery,
            6 => DeliveryStatus::Delivered,
            7 => DeliveryStatus::Returned,
            8 => DeliveryStatus::Cancelled,
            9 => DeliveryStatus::Failed,
            _ => DeliveryStatus::Pending,
        }
    }

    /// The order-status transition a terminal delivery state implies,
    /// if any.
    pub fn implied_order_status(&self) -> Option<OrderStatus> {
        match self {
            DeliveryStatus::Delivered => Some(OrderStatus::Delivered),
            DeliveryStatus::Returned => Some(OrderStatus::Returned),
            DeliveryStatus::Cancelled => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns the status name as displayed to shoppers.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "Pending",
            DeliveryStatus::Processing => "Processing",
            DeliveryStatus::Shipped => "Shipped",
            DeliveryStatus::InTransit => "In Transit",
            DeliveryStatus::OutForDelivery => "Out for Delivery",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Returned => "Returned",
            DeliveryStatus::Cancelled => "Cancelled",
            DeliveryStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One carrier tracking event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: String,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub remark: Option<String>,
}

/// Shipment booking progress and live delivery state for an order.
///
/// Populated field by field as the orchestration advances; the persisted
/// value is the resumable checkpoint after a crash or step failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub courier: Option<String>,
    pub shipment_id: Option<String>,
    pub tracking_id: Option<String>,
    pub awb_code: Option<String>,
    pub label_url: Option<String>,
    pub status: DeliveryStatus,
    /// Append-only log as supplied by the carrier; replaced wholesale on
    /// each reconciliation.
    pub tracking_history: Vec<TrackingEvent>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub pickup_scheduled: bool,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for DeliveryInfo {
    fn default() -> Self {
        Self {
            courier: None,
            shipment_id: None,
            tracking_id: None,
            awb_code: None,
            label_url: None,
            status: DeliveryStatus::Pending,
            tracking_history: Vec::new(),
            estimated_delivery: None,
            pickup_scheduled: false,
            last_error: None,
            updated_at: None,
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Returned => "Returned",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line on a committed order. Prices are frozen at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub selected_color: Option<String>,
    pub selected_size: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub weight_grams: Option<u32>,
}

/// A committed order.
///
/// Created once by the order committer and never deleted. After payment
/// is confirmed the record is immutable except for `delivery_info` and
/// `order_status` transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user: Option<UserId>,
    pub items: Vec<OrderItem>,
    pub billing_address: Address,
    pub shipping_address: Address,
    pub billing_address_id: AddressId,
    pub shipping_address_id: AddressId,
    pub coupon_used: Option<CouponSnapshot>,
    pub total_amount: Money,
    pub payment_info: PaymentInfo,
    pub delivery_info: DeliveryInfo,
    pub order_status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Materializes an order from a cart snapshot and a verified payment.
    ///
    /// Item prices are frozen, addresses copied by value, the coupon
    /// snapshot carries its computed discount amount. The order starts
    /// Confirmed/Paid with delivery Pending.
    pub fn materialize(
        cart: &Cart,
        billing_address_id: AddressId,
        billing_address: Address,
        shipping_address_id: AddressId,
        shipping_address: Address,
        gateway_order_id: impl Into<String>,
        gateway_payment_id: impl Into<String>,
        courier: Option<String>,
    ) -> Self {
        let items = cart
            .items
            .iter()
            .map(|line| OrderItem {
                product_id: line.product_id.clone(),
                name: line.product_name.clone(),
                selected_color: line.selected_color.clone(),
                selected_size: line.selected_size.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                weight_grams: line.weight_grams,
            })
            .collect();

        Self {
            id: OrderId::new(),
            user: cart.owner.user_id(),
            items,
            billing_address,
            shipping_address,
            billing_address_id,
            shipping_address_id,
            coupon_used: cart.coupon.as_ref().map(CouponSnapshot::from),
            total_amount: cart.total,
            payment_info: PaymentInfo {
                gateway_payment_id: gateway_payment_id.into(),
                gateway_order_id: gateway_order_id.into(),
                status: PaymentStatus::Paid,
            },
            delivery_info: DeliveryInfo {
                courier,
                ..DeliveryInfo::default()
            },
            order_status: OrderStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    /// Total package weight: Σ(item weight × quantity), defaulting the
    /// per-item weight where unspecified.
    pub fn package_weight_grams(&self) -> u32 {
        self.items
            .iter()
            .map(|item| item.weight_grams.unwrap_or(DEFAULT_ITEM_WEIGHT_GRAMS) * item.quantity)
            .sum()
    }

    /// Returns true once the backing payment has been confirmed.
    pub fn is_paid(&self) -> bool {
        self.payment_info.status == PaymentStatus::Paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, CartOwner};
    use crate::coupon::{AppliedCoupon, Discount};
    use common::CouponId;

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
            address_type: Some("Home".to_string()),
        }
    }

    fn paid_cart() -> Cart {
        let user = UserId::new();
        let mut cart = Cart::new(CartOwner::User(user));
        cart.add_item(CartItem::new(
            "SKU-001",
            "Widget",
            2,
            Money::from_rupees(1000),
        ))
        .unwrap();
        cart.set_coupon(AppliedCoupon {
            coupon_id: CouponId::new(),
            code: "SAVE10".to_string(),
            discount: Discount::Percentage(10),
            discount_amount: Money::zero(),
            min_purchase: Money::from_rupees(500),
        });
        cart
    }

    #[test]
    fn materialize_freezes_cart_state() {
        let cart = paid_cart();
        let order = Order::materialize(
            &cart,
            AddressId::new(),
            address(),
            AddressId::new(),
            address(),
            "order_abc",
            "pay_xyz",
            Some("Shiprocket".to_string()),
        );

        assert_eq!(order.user, cart.owner.user_id());
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].unit_price, Money::from_rupees(1000));
        assert_eq!(order.total_amount, Money::from_rupees(1800));
        assert_eq!(
            order.coupon_used.as_ref().unwrap().discount_amount,
            Money::from_rupees(200)
        );
        assert_eq!(order.payment_info.status, PaymentStatus::Paid);
        assert_eq!(order.order_status, OrderStatus::Confirmed);
        assert_eq!(order.delivery_info.status, DeliveryStatus::Pending);
        assert!(order.is_paid());
    }

    #[test]
    fn carrier_code_mapping() {
        assert_eq!(DeliveryStatus::from_carrier_code(1), DeliveryStatus::Pending);
        assert_eq!(DeliveryStatus::from_carrier_code(4), DeliveryStatus::InTransit);
        assert_eq!(DeliveryStatus::from_carrier_code(6), DeliveryStatus::Delivered);
        assert_eq!(DeliveryStatus::from_carrier_code(9), DeliveryStatus::Failed);
        // Unknown codes fall back to Pending.
        assert_eq!(DeliveryStatus::from_carrier_code(42), DeliveryStatus::Pending);
    }

    #[test]
    fn delivery_status_display_uses_spaced_names() {
        assert_eq!(DeliveryStatus::OutForDelivery.to_string(), "Out for Delivery");
        assert_eq!(DeliveryStatus::InTransit.to_string(), "In Transit");
    }

    #[test]
    fn implied_order_status_for_terminal_states() {
        assert_eq!(
            DeliveryStatus::Delivered.implied_order_status(),
            Some(OrderStatus::Delivered)
        );
        assert_eq!(
            DeliveryStatus::Returned.implied_order_status(),
            Some(OrderStatus::Returned)
        );
        assert_eq!(DeliveryStatus::Processing.implied_order_status(), None);
        // In-flight carrier states only touch delivery_info.
        assert_eq!(DeliveryStatus::Shipped.implied_order_status(), None);
        assert_eq!(DeliveryStatus::InTransit.implied_order_status(), None);
        assert_eq!(DeliveryStatus::OutForDelivery.implied_order_status(), None);
    }

    #[test]
    fn package_weight_sums_with_default() {
        let mut cart = paid_cart();
        cart.add_item(
            CartItem::new("SKU-002", "Gadget", 3, Money::from_rupees(10)).with_weight_grams(100),
        )
        .unwrap();
        let order = Order::materialize(
            &cart,
            AddressId::new(),
            address(),
            AddressId::new(),
            address(),
            "order_abc",
            "pay_xyz",
            None,
        );
        assert_eq!(order.package_weight_grams(), 2 * 500 + 3 * 100);
    }
}
