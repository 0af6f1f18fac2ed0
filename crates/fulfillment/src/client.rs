//! HTTP carrier gateway.
//!
//! Implements [`CarrierGateway`] against a Shiprocket-style v1 external
//! API. Authentication is a login call returning a bearer token; the
//! token is cached in the client and re-fetched lazily after a 401.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use domain::Order;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::FulfillmentError;
use crate::gateway::{
    AwbAssignment, CarrierGateway, CarrierTrackingEvent, CourierOffer, CreatedShipment,
    ShippingLabel, TrackingSnapshot,
};

/// Carrier connection settings.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub base_url: String,
    pub email: String,
    pub password: SecretString,
    /// Registered pickup location name, "Primary" unless overridden.
    pub pickup_location: String,
    pub pickup_pincode: String,
    pub timeout: Duration,
}

/// HTTP implementation of the carrier gateway.
pub struct HttpCarrierGateway {
    config: CarrierConfig,
    client: reqwest::Client,
    token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    order_id: serde_json::Value,
    shipment_id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ServiceabilityResponse {
    #[serde(default)]
    data: ServiceabilityData,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceabilityData {
    #[serde(default)]
    available_courier_companies: Vec<CourierCompany>,
}

#[derive(Debug, Deserialize)]
struct CourierCompany {
    courier_company_id: u32,
    courier_name: String,
}

#[derive(Debug, Deserialize)]
struct AwbResponse {
    response: AwbResponseBody,
}

#[derive(Debug, Deserialize)]
struct AwbResponseBody {
    data: AwbData,
}

#[derive(Debug, Deserialize)]
struct AwbData {
    awb_code: String,
    courier_name: String,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    label_url: String,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    tracking_data: TrackingData,
}

#[derive(Debug, Deserialize)]
struct TrackingData {
    #[serde(default)]
    shipment_status: u32,
    #[serde(default)]
    shipment_track_activities: Vec<TrackActivity>,
    #[serde(default)]
    etd: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackActivity {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    activity: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderItemPayload {
    name: String,
    sku: String,
    units: u32,
    selling_price: f64,
}

impl HttpCarrierGateway {
    /// Creates a gateway over the given configuration. No network call
    /// is made until the first booking step.
    pub fn new(config: CarrierConfig) -> Result<Self, FulfillmentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/external/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Returns the cached bearer token, logging in first when absent.
    async fn token(&self) -> Result<String, FulfillmentError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }

        let mut slot = self.token.write().await;
        // Another caller may have logged in while we waited.
        if let Some(token) = slot.clone() {
            return Ok(token);
        }

        tracing::debug!("carrier login");
        let response = self
            .client
            .post(self.url("auth/login"))
            .json(&json!({
                "email": self.config.email,
                "password": self.config.password.expose_secret(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FulfillmentError::Auth(format!(
                "login returned {}",
                response.status()
            )));
        }

        let login: LoginResponse = response.json().await?;
        *slot = Some(login.token.clone());
        Ok(login.token)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    /// Sends an authenticated request, retrying once with a fresh token
    /// after a 401.
    async fn send_authed(
        &self,
        build: impl Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FulfillmentError> {
        let token = self.token().await?;
        let response = build(&self.client, &token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!("carrier token rejected, re-authenticating");
        self.invalidate_token().await;
        let token = self.token().await?;
        Ok(build(&self.client, &token).send().await?)
    }

    fn order_payload(&self, order: &Order) -> serde_json::Value {
        let billing = &order.billing_address;
        let items: Vec<OrderItemPayload> = order
            .items
            .iter()
            .map(|item| OrderItemPayload {
                name: item.name.clone(),
                sku: item.product_id.to_string(),
                units: item.quantity,
                selling_price: item.unit_price.paise() as f64 / 100.0,
            })
            .collect();

        json!({
            "order_id": order.id.to_string(),
            "order_date": order.created_at.format("%Y-%m-%d").to_string(),
            "pickup_location": self.config.pickup_location,
            "billing_customer_name": billing.name,
            "billing_last_name": "",
            "billing_address": billing.address_line1,
            "billing_city": billing.city,
            "billing_pincode": billing.pincode,
            "billing_state": billing.state,
            "billing_country": "India",
            "billing_phone": billing.phone,
            "shipping_is_billing": order.shipping_address == order.billing_address,
            "shipping_customer_name": order.shipping_address.name,
            "shipping_address": order.shipping_address.address_line1,
            "shipping_city": order.shipping_address.city,
            "shipping_pincode": order.shipping_address.pincode,
            "shipping_state": order.shipping_address.state,
            "shipping_country": "India",
            "shipping_phone": order.shipping_address.phone,
            "order_items": items,
            "payment_method": "Prepaid",
            "sub_total": order.total_amount.paise() as f64 / 100.0,
            "length": 10,
            "breadth": 10,
            "height": 10,
            "weight": f64::from(order.package_weight_grams()) / 1000.0,
        })
    }

    async fn check_carrier_status(
        response: reqwest::Response,
        call: &str,
    ) -> Result<reqwest::Response, FulfillmentError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(FulfillmentError::Carrier(format!(
            "{call} returned {status}: {body}"
        )))
    }
}

/// Parses a carrier timestamp, trying RFC 3339 then the carrier's
/// space-separated local format.
fn parse_carrier_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl CarrierGateway for HttpCarrierGateway {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    async fn create_order(&self, order: &Order) -> Result<CreatedShipment, FulfillmentError> {
        let payload = self.order_payload(order);
        let response = self
            .send_authed(|client, token| {
                client
                    .post(self.url("orders/create/adhoc"))
                    .bearer_auth(token)
                    .json(&payload)
            })
            .await?;
        let response = Self::check_carrier_status(response, "create order").await?;

        let created: CreateOrderResponse = response.json().await?;
        Ok(CreatedShipment {
            // Numeric in practice, but the API is loose about it.
            shipment_id: value_to_string(&created.shipment_id),
            carrier_order_id: value_to_string(&created.order_id),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn check_serviceability(
        &self,
        pickup_pincode: &str,
        delivery_pincode: &str,
        weight_grams: u32,
    ) -> Result<Vec<CourierOffer>, FulfillmentError> {
        let weight_kg = (f64::from(weight_grams) / 1000.0).to_string();
        let response = self
            .send_authed(|client, token| {
                client
                    .get(self.url("courier/serviceability/"))
                    .bearer_auth(token)
                    .query(&[
                        ("pickup_postcode", pickup_pincode),
                        ("delivery_postcode", delivery_pincode),
                        ("weight", weight_kg.as_str()),
                        ("cod", "0"),
                    ])
            })
            .await?;
        let response = Self::check_carrier_status(response, "serviceability").await?;

        let body: ServiceabilityResponse = response.json().await?;
        Ok(body
            .data
            .available_courier_companies
            .into_iter()
            .map(|company| CourierOffer {
                courier_id: company.courier_company_id,
                courier_name: company.courier_name,
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn assign_awb(
        &self,
        shipment_id: &str,
        courier_id: u32,
    ) -> Result<AwbAssignment, FulfillmentError> {
        let response = self
            .send_authed(|client, token| {
                client
                    .post(self.url("courier/assign/awb"))
                    .bearer_auth(token)
                    .json(&json!({
                        "shipment_id": shipment_id,
                        "courier_id": courier_id,
                    }))
            })
            .await?;
        let response = Self::check_carrier_status(response, "assign awb").await?;

        let body: AwbResponse = response.json().await?;
        Ok(AwbAssignment {
            awb_code: body.response.data.awb_code,
            courier_name: body.response.data.courier_name,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn generate_pickup(&self, shipment_id: &str) -> Result<(), FulfillmentError> {
        let response = self
            .send_authed(|client, token| {
                client
                    .post(self.url("courier/generate/pickup"))
                    .bearer_auth(token)
                    .json(&json!({ "shipment_id": [shipment_id] }))
            })
            .await?;
        Self::check_carrier_status(response, "generate pickup").await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn generate_label(&self, shipment_id: &str) -> Result<ShippingLabel, FulfillmentError> {
        let response = self
            .send_authed(|client, token| {
                client
                    .post(self.url("courier/generate/label"))
                    .bearer_auth(token)
                    .json(&json!({ "shipment_id": [shipment_id] }))
            })
            .await?;
        let response = Self::check_carrier_status(response, "generate label").await?;

        let body: LabelResponse = response.json().await?;
        Ok(ShippingLabel {
            label_url: body.label_url,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn track(&self, awb_code: &str) -> Result<TrackingSnapshot, FulfillmentError> {
        let response = self
            .send_authed(|client, token| {
                client
                    .get(self.url(&format!("courier/track/awb/{awb_code}")))
                    .bearer_auth(token)
            })
            .await?;
        let response = Self::check_carrier_status(response, "track").await?;

        let body: TrackResponse = response.json().await?;
        let events = body
            .tracking_data
            .shipment_track_activities
            .into_iter()
            .map(|activity| CarrierTrackingEvent {
                status: activity
                    .status
                    .or(activity.activity.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                location: activity.location,
                timestamp: activity.date.as_deref().and_then(parse_carrier_timestamp),
                remark: activity.activity,
            })
            .collect();

        Ok(TrackingSnapshot {
            status_code: body.tracking_data.shipment_status,
            events,
            estimated_delivery: body
                .tracking_data
                .etd
                .as_deref()
                .and_then(parse_carrier_timestamp),
        })
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_parsing_accepts_both_formats() {
        assert!(parse_carrier_timestamp("2026-08-20T10:15:00Z").is_some());
        assert!(parse_carrier_timestamp("2026-08-20 10:15:00").is_some());
        assert!(parse_carrier_timestamp("20/08/2026").is_none());
        assert!(parse_carrier_timestamp("").is_none());
    }

    #[test]
    fn numeric_and_string_ids_normalize() {
        assert_eq!(value_to_string(&json!("12345")), "12345");
        assert_eq!(value_to_string(&json!(12345)), "12345");
    }

    #[test]
    fn base_url_trailing_slash_is_tolerated() {
        let gateway = HttpCarrierGateway::new(CarrierConfig {
            base_url: "https://carrier.test/".to_string(),
            email: "ops@example.com".to_string(),
            password: SecretString::from("pw"),
            pickup_location: "Primary".to_string(),
            pickup_pincode: "560001".to_string(),
            timeout: Duration::from_secs(10),
        })
        .unwrap();
        assert_eq!(
            gateway.url("auth/login"),
            "https://carrier.test/v1/external/auth/login"
        );
    }
}
