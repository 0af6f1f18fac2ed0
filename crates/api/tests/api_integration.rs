//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use checkout::HmacVerifier;
use common::{Money, UserId};
use domain::{Address, Coupon, Discount};
use fulfillment::InMemoryCarrierGateway;
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::SecretString;
use store::{InMemoryAddressBook, MemoryStore, StorefrontStore};
use tower::ServiceExt;

use api::config::Config;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: MemoryStore,
    gateway: InMemoryCarrierGateway,
    addresses: Arc<InMemoryAddressBook>,
    verifier: HmacVerifier,
}

fn setup() -> TestApp {
    let config = Config::default();
    let verifier = HmacVerifier::new(SecretString::from("dev-secret"));
    let (state, store, gateway, addresses) = api::create_default_state(&config);
    let app = api::create_app(state, get_metrics_handle());
    TestApp {
        app,
        store,
        gateway,
        addresses,
        verifier,
    }
}

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

async fn seed_coupon(store: &MemoryStore) {
    let now = Utc::now();
    store
        .put_coupon(&Coupon::new(
            "SAVE10",
            Discount::Percentage(10),
            Money::from_rupees(500),
            now - Duration::days(1),
            now + Duration::days(1),
        ))
        .await
        .unwrap();
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_check() {
    let t = setup();
    let (status, json) = get_json(&t.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let t = setup();
    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_checkout_flow_over_http() {
    let t = setup();
    seed_coupon(&t.store).await;
    let user = UserId::new();
    let billing = t.addresses.insert(address()).await;
    let shipping = t.addresses.insert(address()).await;

    // Build the cart.
    let (status, cart) = post_json(
        &t.app,
        "/carts/items",
        serde_json::json!({
            "user_id": user,
            "product_id": "SKU-001",
            "product_name": "Widget",
            "unit_price_paise": 100_000,
            "quantity": 2
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["subtotal"], 200_000);
    let cart_id = cart["id"].as_str().unwrap().to_string();

    // Apply the coupon.
    let (status, cart) = post_json(
        &t.app,
        &format!("/carts/{cart_id}/coupon"),
        serde_json::json!({ "coupon_code": "save10" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["discount_amount"], 20_000);
    assert_eq!(cart["total"], 180_000);

    // Confirm the payment.
    let signature = t.verifier.sign("order_live", "pay_live");
    let (status, body) = post_json(
        &t.app,
        "/checkout/confirm",
        serde_json::json!({
            "gateway_order_id": "order_live",
            "gateway_payment_id": "pay_live",
            "signature": signature,
            "cart_id": cart_id,
            "billing_address_id": billing,
            "shipping_address_id": shipping
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let order_id = body["order_id"].as_str().unwrap().to_string();

    // Booking ran in-request against the in-memory carrier.
    assert_eq!(t.gateway.create_calls(), 1);
    assert_eq!(t.gateway.label_calls(), 1);

    // The listing shows the booked order.
    let (status, orders) = get_json(&t.app, &format!("/orders?user_id={user}")).await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], serde_json::json!(order_id));
    assert_eq!(orders[0]["total_amount"], 180_000);
    assert!(orders[0]["delivery_info"]["awb_code"].as_str().is_some());

    // Single-order fetch works too.
    let (status, order) = get_json(&t.app, &format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_status"], "Processing");
}

#[tokio::test]
async fn retried_confirmation_is_idempotent_over_http() {
    let t = setup();
    let user = UserId::new();
    let billing = t.addresses.insert(address()).await;
    let shipping = t.addresses.insert(address()).await;

    let (_, cart) = post_json(
        &t.app,
        "/carts/items",
        serde_json::json!({
            "user_id": user,
            "product_id": "SKU-001",
            "product_name": "Widget",
            "unit_price_paise": 50_000,
            "quantity": 1
        }),
    )
    .await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let signature = t.verifier.sign("order_r", "pay_r");
    let request = serde_json::json!({
        "gateway_order_id": "order_r",
        "gateway_payment_id": "pay_r",
        "signature": signature,
        "cart_id": cart_id,
        "billing_address_id": billing,
        "shipping_address_id": shipping
    });

    let (status, first) = post_json(&t.app, "/checkout/confirm", request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = post_json(&t.app, "/checkout/confirm", request).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first["order_id"], second["order_id"]);
    assert_eq!(t.store.order_count().await, 1);
}

#[tokio::test]
async fn forged_signature_is_rejected() {
    let t = setup();
    let user = UserId::new();
    let billing = t.addresses.insert(address()).await;
    let shipping = t.addresses.insert(address()).await;

    let (_, cart) = post_json(
        &t.app,
        "/carts/items",
        serde_json::json!({
            "user_id": user,
            "product_id": "SKU-001",
            "product_name": "Widget",
            "unit_price_paise": 50_000,
            "quantity": 1
        }),
    )
    .await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &t.app,
        "/checkout/confirm",
        serde_json::json!({
            "gateway_order_id": "order_f",
            "gateway_payment_id": "pay_f",
            "signature": "00".repeat(32),
            "cart_id": cart_id,
            "billing_address_id": billing,
            "shipping_address_id": shipping
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn coupon_rejection_reports_reason() {
    let t = setup();
    let user = UserId::new();

    let (_, cart) = post_json(
        &t.app,
        "/carts/items",
        serde_json::json!({
            "user_id": user,
            "product_id": "SKU-001",
            "product_name": "Widget",
            "unit_price_paise": 100_000,
            "quantity": 1
        }),
    )
    .await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &t.app,
        &format!("/carts/{cart_id}/coupon"),
        serde_json::json!({ "coupon_code": "NOPE" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "coupon not found");
}

#[tokio::test]
async fn remove_item_updates_totals() {
    let t = setup();
    let user = UserId::new();

    let (_, cart) = post_json(
        &t.app,
        "/carts/items",
        serde_json::json!({
            "user_id": user,
            "product_id": "SKU-001",
            "product_name": "Widget",
            "unit_price_paise": 100_000,
            "quantity": 1,
            "color": "red"
        }),
    )
    .await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/carts/{cart_id}/items"))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_string(&serde_json::json!({
                        "product_id": "SKU-001",
                        "color": "red"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let cart: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
    assert_eq!(cart["total"], 0);
}

#[tokio::test]
async fn unknown_order_is_404() {
    let t = setup();
    let (status, body) = get_json(&t.app, &format!("/orders/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}
