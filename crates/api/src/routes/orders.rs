//! Order read endpoints with live tracking.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{OrderId, UserId};
use domain::Order;
use fulfillment::CarrierGateway;
use serde::Deserialize;
use store::StorefrontStore;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: UserId,
}

/// GET /orders?user_id=: lists a user's orders, most recent first,
/// with live tracking reconciled into each shipped order.
#[tracing::instrument(skip(state, query), fields(user_id = %query.user_id))]
pub async fn list<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError>
where
    S: StorefrontStore + Clone + 'static,
    G: CarrierGateway + Clone + 'static,
{
    let orders = state
        .reconciler
        .orders_with_live_tracking(query.user_id)
        .await?;
    Ok(Json(orders))
}

/// GET /orders/{id}: returns one order with live tracking reconciled.
#[tracing::instrument(skip(state))]
pub async fn get<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError>
where
    S: StorefrontStore + Clone + 'static,
    G: CarrierGateway + Clone + 'static,
{
    let order_id = OrderId::from_uuid(id);
    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order not found: {order_id}")))?;
    let order = state.reconciler.reconcile(order).await;
    Ok(Json(order))
}
