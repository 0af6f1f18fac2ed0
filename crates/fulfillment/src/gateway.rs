//! Carrier gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::Order;

use crate::error::FulfillmentError;

/// Result of registering an order with the carrier.
#[derive(Debug, Clone)]
pub struct CreatedShipment {
    /// The carrier's shipment identifier, used by all later calls.
    pub shipment_id: String,
    /// The carrier's own order identifier.
    pub carrier_order_id: String,
}

/// A courier able to serve the destination.
#[derive(Debug, Clone)]
pub struct CourierOffer {
    pub courier_id: u32,
    pub courier_name: String,
}

/// Result of assigning an air waybill.
#[derive(Debug, Clone)]
pub struct AwbAssignment {
    pub awb_code: String,
    pub courier_name: String,
}

/// A generated shipping label.
#[derive(Debug, Clone)]
pub struct ShippingLabel {
    pub label_url: String,
}

/// One tracking event as reported by the carrier. The timestamp is
/// `None` when the carrier's value failed to parse.
#[derive(Debug, Clone)]
pub struct CarrierTrackingEvent {
    pub status: String,
    pub location: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub remark: Option<String>,
}

/// Live tracking state for an AWB.
#[derive(Debug, Clone)]
pub struct TrackingSnapshot {
    /// Carrier status code (1–9).
    pub status_code: u32,
    pub events: Vec<CarrierTrackingEvent>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// The carrier booking and tracking surface.
///
/// One call per booking step so the orchestrator can persist progress
/// between steps and resume after a failure.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    /// Registers the order with the carrier.
    async fn create_order(&self, order: &Order) -> Result<CreatedShipment, FulfillmentError>;

    /// Lists couriers able to deliver to the pincode for the weight.
    async fn check_serviceability(
        &self,
        pickup_pincode: &str,
        delivery_pincode: &str,
        weight_grams: u32,
    ) -> Result<Vec<CourierOffer>, FulfillmentError>;

    /// Assigns an AWB for the shipment with the chosen courier.
    async fn assign_awb(
        &self,
        shipment_id: &str,
        courier_id: u32,
    ) -> Result<AwbAssignment, FulfillmentError>;

    /// Requests a pickup for the shipment.
    async fn generate_pickup(&self, shipment_id: &str) -> Result<(), FulfillmentError>;

    /// Generates the shipping label document.
    async fn generate_label(&self, shipment_id: &str) -> Result<ShippingLabel, FulfillmentError>;

    /// Fetches live tracking for an AWB.
    async fn track(&self, awb_code: &str) -> Result<TrackingSnapshot, FulfillmentError>;
}

#[async_trait]
impl<T: CarrierGateway + ?Sized> CarrierGateway for Arc<T> {
    async fn create_order(&self, order: &Order) -> Result<CreatedShipment, FulfillmentError> {
        (**self).create_order(order).await
    }

    async fn check_serviceability(
        &self,
        pickup_pincode: &str,
        delivery_pincode: &str,
        weight_grams: u32,
    ) -> Result<Vec<CourierOffer>, FulfillmentError> {
        (**self)
            .check_serviceability(pickup_pincode, delivery_pincode, weight_grams)
            .await
    }

    async fn assign_awb(
        &self,
        shipment_id: &str,
        courier_id: u32,
    ) -> Result<AwbAssignment, FulfillmentError> {
        (**self).assign_awb(shipment_id, courier_id).await
    }

    async fn generate_pickup(&self, shipment_id: &str) -> Result<(), FulfillmentError> {
        (**self).generate_pickup(shipment_id).await
    }

    async fn generate_label(&self, shipment_id: &str) -> Result<ShippingLabel, FulfillmentError> {
        (**self).generate_label(shipment_id).await
    }

    async fn track(&self, awb_code: &str) -> Result<TrackingSnapshot, FulfillmentError> {
        (**self).track(awb_code).await
    }
}

#[derive(Debug, Default)]
struct InMemoryCarrierState {
    next_id: u32,
    shipments: HashMap<String, String>,
    tracking: HashMap<String, TrackingSnapshot>,
    fail_on_create: bool,
    fail_on_serviceability: bool,
    no_couriers: bool,
    fail_on_awb: bool,
    fail_on_pickup: bool,
    fail_on_track: bool,
    /// Label calls fail until this many attempts have been made.
    label_failures_before_success: u32,
    create_calls: u32,
    awb_calls: u32,
    pickup_calls: u32,
    label_calls: u32,
    track_calls: u32,
}

/// In-memory carrier gateway for testing, with per-call failure
/// injection and call counting.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCarrierGateway {
    state: Arc<RwLock<InMemoryCarrierState>>,
}

impl InMemoryCarrierGateway {
    /// Creates a new in-memory carrier gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures create_order to fail.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures check_serviceability to fail.
    pub fn set_fail_on_serviceability(&self, fail: bool) {
        self.state.write().unwrap().fail_on_serviceability = fail;
    }

    /// Configures check_serviceability to return no couriers.
    pub fn set_no_couriers(&self, empty: bool) {
        self.state.write().unwrap().no_couriers = empty;
    }

    /// Configures assign_awb to fail.
    pub fn set_fail_on_awb(&self, fail: bool) {
        self.state.write().unwrap().fail_on_awb = fail;
    }

    /// Configures generate_pickup to fail.
    pub fn set_fail_on_pickup(&self, fail: bool) {
        self.state.write().unwrap().fail_on_pickup = fail;
    }

    /// Configures track to fail.
    pub fn set_fail_on_track(&self, fail: bool) {
        self.state.write().unwrap().fail_on_track = fail;
    }

    /// Makes the first `count` generate_label calls fail.
    pub fn set_label_failures(&self, count: u32) {
        self.state.write().unwrap().label_failures_before_success = count;
    }

    /// Seeds the tracking snapshot returned for an AWB.
    pub fn set_tracking(&self, awb_code: &str, snapshot: TrackingSnapshot) {
        self.state
            .write()
            .unwrap()
            .tracking
            .insert(awb_code.to_string(), snapshot);
    }

    /// Number of create_order calls made.
    pub fn create_calls(&self) -> u32 {
        self.state.read().unwrap().create_calls
    }

    /// Number of assign_awb calls made.
    pub fn awb_calls(&self) -> u32 {
        self.state.read().unwrap().awb_calls
    }

    /// Number of generate_pickup calls made.
    pub fn pickup_calls(&self) -> u32 {
        self.state.read().unwrap().pickup_calls
    }

    /// Number of generate_label calls made.
    pub fn label_calls(&self) -> u32 {
        self.state.read().unwrap().label_calls
    }

    /// Number of track calls made.
    pub fn track_calls(&self) -> u32 {
        self.state.read().unwrap().track_calls
    }
}

#[async_trait]
impl CarrierGateway for InMemoryCarrierGateway {
    async fn create_order(&self, order: &Order) -> Result<CreatedShipment, FulfillmentError> {
        let mut state = self.state.write().unwrap();
        state.create_calls += 1;

        if state.fail_on_create {
            return Err(FulfillmentError::Carrier("create rejected".to_string()));
        }

        state.next_id += 1;
        let shipment_id = format!("SHIP-{:04}", state.next_id);
        let carrier_order_id = format!("CO-{:04}", state.next_id);
        state
            .shipments
            .insert(shipment_id.clone(), order.id.to_string());

        Ok(CreatedShipment {
            shipment_id,
            carrier_order_id,
        })
    }

    async fn check_serviceability(
        &self,
        _pickup_pincode: &str,
        delivery_pincode: &str,
        _weight_grams: u32,
    ) -> Result<Vec<CourierOffer>, FulfillmentError> {
        let state = self.state.read().unwrap();
        if state.fail_on_serviceability {
            return Err(FulfillmentError::Carrier(
                "serviceability unavailable".to_string(),
            ));
        }
        if state.no_couriers {
            return Ok(Vec::new());
        }
        let _ = delivery_pincode;
        Ok(vec![CourierOffer {
            courier_id: 1,
            courier_name: "Test Express".to_string(),
        }])
    }

    async fn assign_awb(
        &self,
        shipment_id: &str,
        _courier_id: u32,
    ) -> Result<AwbAssignment, FulfillmentError> {
        let mut state = self.state.write().unwrap();
        state.awb_calls += 1;

        if state.fail_on_awb {
            return Err(FulfillmentError::Carrier("awb assignment failed".to_string()));
        }

        Ok(AwbAssignment {
            awb_code: format!("AWB-{shipment_id}"),
            courier_name: "Test Express".to_string(),
        })
    }

    async fn generate_pickup(&self, _shipment_id: &str) -> Result<(), FulfillmentError> {
        let mut state = self.state.write().unwrap();
        state.pickup_calls += 1;

        if state.fail_on_pickup {
            return Err(FulfillmentError::Carrier("pickup scheduling failed".to_string()));
        }
        Ok(())
    }

    async fn generate_label(&self, shipment_id: &str) -> Result<ShippingLabel, FulfillmentError> {
        let mut state = self.state.write().unwrap();
        state.label_calls += 1;

        if state.label_calls <= state.label_failures_before_success {
            return Err(FulfillmentError::Carrier("label generation failed".to_string()));
        }

        Ok(ShippingLabel {
            label_url: format!("https://labels.test/{shipment_id}.pdf"),
        })
    }

    async fn track(&self, awb_code: &str) -> Result<TrackingSnapshot, FulfillmentError> {
        let mut state = self.state.write().unwrap();
        state.track_calls += 1;

        if state.fail_on_track {
            return Err(FulfillmentError::Carrier("tracking unavailable".to_string()));
        }

        Ok(state
            .tracking
            .get(awb_code)
            .cloned()
            .unwrap_or(TrackingSnapshot {
                status_code: 1,
                events: Vec::new(),
                estimated_delivery: None,
            }))
    }
}
