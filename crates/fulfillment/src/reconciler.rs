//! Tracking reconciliation.
//!
//! Pulls live tracking from the carrier for shipped orders and folds it
//! into the stored delivery state. Reconciliation is read-repair for
//! display: a carrier outage must never break an order listing, so
//! failures are recorded on the order and swallowed.

use chrono::Utc;
use common::UserId;
use domain::{DeliveryStatus, Order, TrackingEvent};
use store::StorefrontStore;

use crate::error::FulfillmentError;
use crate::gateway::CarrierGateway;

/// Folds live carrier tracking into stored orders.
pub struct TrackingReconciler<S: StorefrontStore, G: CarrierGateway> {
    store: S,
    gateway: G,
}

impl<S: StorefrontStore, G: CarrierGateway> TrackingReconciler<S, G> {
    /// Creates a reconciler over the given store and carrier gateway.
    pub fn new(store: S, gateway: G) -> Self {
        Self { store, gateway }
    }

    /// Refreshes one order from live carrier tracking.
    ///
    /// Orders without an AWB pass through unchanged. The tracking
    /// history is replaced wholesale with the carrier's list; events
    /// whose timestamps failed to parse get the reconciliation time.
    /// Terminal delivery states advance the order status. A carrier
    /// failure records the error and returns the order otherwise
    /// unchanged.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn reconcile(&self, mut order: Order) -> Order {
        let Some(awb_code) = order.delivery_info.awb_code.clone() else {
            return order;
        };

        let snapshot = match self.gateway.track(&awb_code).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(%awb_code, error = %err, "tracking fetch failed");
                metrics::counter!("reconciliation_failures_total").increment(1);
                order.delivery_info.last_error = Some(format!("track: {err}"));
                if let Err(persist_err) = self
                    .store
                    .update_delivery(order.id, &order.delivery_info, order.order_status)
                    .await
                {
                    tracing::warn!(order_id = %order.id, error = %persist_err,
                        "failed to persist tracking error");
                }
                return order;
            }
        };

        let now = Utc::now();
        order.delivery_info.status = DeliveryStatus::from_carrier_code(snapshot.status_code);
        order.delivery_info.tracking_history = snapshot
            .events
            .into_iter()
            .map(|event| TrackingEvent {
                status: event.status,
                location: event.location,
                timestamp: event.timestamp.unwrap_or(now),
                remark: event.remark,
            })
            .collect();
        if let Some(estimated) = snapshot.estimated_delivery {
            order.delivery_info.estimated_delivery = Some(estimated);
        }
        order.delivery_info.last_error = None;
        order.delivery_info.updated_at = Some(now);

        if let Some(implied) = order.delivery_info.status.implied_order_status() {
            order.order_status = implied;
        }

        if let Err(err) = self
            .store
            .update_delivery(order.id, &order.delivery_info, order.order_status)
            .await
        {
            tracing::warn!(order_id = %order.id, error = %err, "failed to persist tracking update");
            metrics::counter!("reconciliation_failures_total").increment(1);
        }

        order
    }

    /// Lists a user's orders with live tracking folded in, most recent
    /// first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_with_live_tracking(
        &self,
        user: UserId,
    ) -> Result<Vec<Order>, FulfillmentError> {
        let orders = self.store.list_orders_for_user(user).await?;
        let mut reconciled = Vec::with_capacity(orders.len());
        for order in orders {
            reconciled.push(self.reconcile(order).await);
        }
        Ok(reconciled)
    }
}
