//! Shipment booking orchestration.
//!
//! Drives the carrier booking sequence for a paid order: register the
//! shipment, pick a courier and assign an AWB, schedule pickup, generate
//! the label. Progress is persisted after every step so a re-run resumes
//! from the last completed step instead of re-booking.

use std::time::Duration;

use common::OrderId;
use domain::{DeliveryStatus, Order, OrderStatus};
use store::StorefrontStore;

use crate::error::FulfillmentError;
use crate::gateway::CarrierGateway;

/// Orchestration tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Carrier name recorded on the order before a courier is assigned.
    pub carrier_name: String,
    pub pickup_pincode: String,
    /// Label generation attempts before giving up.
    pub label_attempts: u32,
    /// Base delay for label retries; doubles each attempt.
    pub label_base_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            carrier_name: "Shiprocket".to_string(),
            pickup_pincode: "560001".to_string(),
            label_attempts: 5,
            label_base_delay: Duration::from_secs(5),
        }
    }
}

/// Books shipments with the carrier, one persisted step at a time.
pub struct ShipmentOrchestrator<S: StorefrontStore, G: CarrierGateway> {
    store: S,
    gateway: G,
    config: OrchestratorConfig,
}

impl<S: StorefrontStore, G: CarrierGateway> ShipmentOrchestrator<S, G> {
    /// Creates an orchestrator over the given store and carrier gateway.
    pub fn new(store: S, gateway: G, config: OrchestratorConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Runs the booking sequence for an order.
    ///
    /// Best-effort: a step failure freezes the persisted delivery state
    /// at Processing with the error recorded and returns `Ok` with the
    /// partially-booked order. Payment state is never touched. Only a
    /// missing or unpaid order is an error to the caller.
    #[tracing::instrument(skip(self))]
    pub async fn process_order(&self, order_id: OrderId) -> Result<Order, FulfillmentError> {
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;

        if !order.is_paid() {
            return Err(FulfillmentError::NotPaid(order_id));
        }

        if order.delivery_info.courier.is_none() {
            order.delivery_info.courier = Some(self.config.carrier_name.clone());
        }

        // Step 1: register the order with the carrier.
        if order.delivery_info.shipment_id.is_none() {
            match self.gateway.create_order(&order).await {
                Ok(created) => {
                    order.delivery_info.shipment_id = Some(created.shipment_id);
                    order.delivery_info.tracking_id = Some(created.carrier_order_id);
                    order.delivery_info.status = DeliveryStatus::Processing;
                    order.order_status = OrderStatus::Processing;
                    self.checkpoint(&mut order, None).await?;
                }
                Err(err) => return self.freeze(order, "create_shipment", err).await,
            }
        }

        // Step 2: courier selection and AWB assignment.
        if order.delivery_info.awb_code.is_none() {
            let shipment_id = match order.delivery_info.shipment_id.clone() {
                Some(id) => id,
                None => return self.freeze(
                    order,
                    "assign_awb",
                    FulfillmentError::Carrier("no shipment id recorded".to_string()),
                )
                .await,
            };
            let weight = order.package_weight_grams();
            let pincode = order.shipping_address.pincode.clone();

            let offers = match self
                .gateway
                .check_serviceability(&self.config.pickup_pincode, &pincode, weight)
                .await
            {
                Ok(offers) => offers,
                Err(err) => return self.freeze(order, "serviceability", err).await,
            };
            let Some(offer) = offers.into_iter().next() else {
                let err = FulfillmentError::NotServiceable { pincode };
                return self.freeze(order, "serviceability", err).await;
            };

            match self.gateway.assign_awb(&shipment_id, offer.courier_id).await {
                Ok(awb) => {
                    order.delivery_info.awb_code = Some(awb.awb_code);
                    order.delivery_info.courier = Some(awb.courier_name);
                    self.checkpoint(&mut order, None).await?;
                }
                Err(err) => return self.freeze(order, "assign_awb", err).await,
            }
        }

        // Step 3: pickup scheduling. Failure is recorded but does not
        // stop the sequence; the label can still be generated.
        if !order.delivery_info.pickup_scheduled {
            let shipment_id = order.delivery_info.shipment_id.clone().unwrap_or_default();
            match self.gateway.generate_pickup(&shipment_id).await {
                Ok(()) => {
                    order.delivery_info.pickup_scheduled = true;
                    self.checkpoint(&mut order, None).await?;
                }
                Err(err) => {
                    tracing::warn!(%order_id, error = %err, "pickup scheduling failed");
                    metrics::counter!("shipment_step_failures_total", "step" => "generate_pickup")
                        .increment(1);
                    order.delivery_info.last_error = Some(format!("generate_pickup: {err}"));
                    self.checkpoint(&mut order, None).await?;
                }
            }
        }

        // Step 4: label generation with exponential backoff.
        if order.delivery_info.label_url.is_none() {
            let shipment_id = order.delivery_info.shipment_id.clone().unwrap_or_default();
            match self.generate_label_with_retry(&shipment_id).await {
                Ok(label_url) => {
                    order.delivery_info.label_url = Some(label_url);
                    order.delivery_info.last_error = None;
                    self.checkpoint(&mut order, None).await?;
                }
                Err(err) => return self.freeze(order, "generate_label", err).await,
            }
        }

        tracing::info!(%order_id, "shipment booked");
        metrics::counter!("shipments_booked_total").increment(1);
        Ok(order)
    }

    /// Retries label generation up to the configured attempt count with
    /// delays of base × 2^attempt between failures.
    async fn generate_label_with_retry(
        &self,
        shipment_id: &str,
    ) -> Result<String, FulfillmentError> {
        let mut last_err = FulfillmentError::Carrier("label generation not attempted".to_string());
        for attempt in 0..self.config.label_attempts {
            if attempt > 0 {
                let delay = self.config.label_base_delay * 2u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }
            match self.gateway.generate_label(shipment_id).await {
                Ok(label) => return Ok(label.label_url),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "label generation attempt failed");
                    metrics::counter!("label_retry_attempts_total").increment(1);
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    /// Records a fatal step failure and returns the partially-booked
    /// order. Delivery and order status freeze at Processing.
    async fn freeze(
        &self,
        mut order: Order,
        step: &str,
        err: FulfillmentError,
    ) -> Result<Order, FulfillmentError> {
        tracing::error!(order_id = %order.id, step, error = %err, "shipment booking halted");
        metrics::counter!("shipment_step_failures_total", "step" => step.to_string()).increment(1);

        order.delivery_info.last_error = Some(format!("{step}: {err}"));
        self.checkpoint(&mut order, Some(OrderStatus::Processing))
            .await?;
        Ok(order)
    }

    /// Persists the current delivery progress.
    async fn checkpoint(
        &self,
        order: &mut Order,
        status_override: Option<OrderStatus>,
    ) -> Result<(), FulfillmentError> {
        if let Some(status) = status_override {
            order.order_status = status;
            order.delivery_info.status = DeliveryStatus::Processing;
        }
        order.delivery_info.updated_at = Some(chrono::Utc::now());
        self.store
            .update_delivery(order.id, &order.delivery_info, order.order_status)
            .await?;
        Ok(())
    }
}
