//! Payment confirmation webhook.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use checkout::PaymentConfirmation;
use common::{AddressId, CartId};
use fulfillment::CarrierGateway;
use serde::{Deserialize, Serialize};
use store::StorefrontStore;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ConfirmCheckoutRequest {
    pub gateway_payment_id: String,
    pub gateway_order_id: String,
    pub signature: String,
    pub cart_id: CartId,
    pub billing_address_id: AddressId,
    pub shipping_address_id: AddressId,
}

#[derive(Serialize)]
pub struct ConfirmCheckoutResponse {
    pub success: bool,
    pub order_id: String,
}

/// POST /checkout/confirm: verifies the payment, commits the order and
/// kicks off shipment booking.
///
/// The response reflects the commit only. Booking runs afterwards in
/// the same request and is best-effort: a committed, paid order is
/// reported as success even when the carrier is down.
#[tracing::instrument(skip(state, req), fields(cart_id = %req.cart_id))]
pub async fn confirm<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Json(req): Json<ConfirmCheckoutRequest>,
) -> Result<Json<ConfirmCheckoutResponse>, ApiError>
where
    S: StorefrontStore + Clone + 'static,
    G: CarrierGateway + Clone + 'static,
{
    let snapshot = state.carts.snapshot_for_checkout(req.cart_id).await?;
    let confirmation = PaymentConfirmation {
        gateway_payment_id: req.gateway_payment_id,
        gateway_order_id: req.gateway_order_id,
        signature: req.signature,
    };

    let order = state
        .committer
        .commit(
            &snapshot,
            &confirmation,
            req.billing_address_id,
            req.shipping_address_id,
        )
        .await?;

    if let Err(err) = state.orchestrator.process_order(order.id).await {
        tracing::error!(order_id = %order.id, error = %err, "shipment booking failed after commit");
    }

    Ok(Json(ConfirmCheckoutResponse {
        success: true,
        order_id: order.id.to_string(),
    }))
}
