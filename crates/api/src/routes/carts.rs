//! Cart mutation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::ProductDetails;
use common::{CartId, CategoryId, Money, ProductId, UserId};
use domain::{Cart, CartOwner};
use fulfillment::CarrierGateway;
use serde::Deserialize;
use store::StorefrontStore;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub user_id: Option<UserId>,
    pub session_id: Option<String>,
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price_paise: i64,
    pub category_id: Option<CategoryId>,
    pub weight_grams: Option<u32>,
    pub quantity: u32,
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Deserialize)]
pub struct RemoveItemRequest {
    pub product_id: String,
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Deserialize)]
pub struct ApplyCouponRequest {
    pub coupon_code: String,
}

fn owner_from(user_id: Option<UserId>, session_id: Option<String>) -> Result<CartOwner, ApiError> {
    match (user_id, session_id) {
        (Some(user), _) => Ok(CartOwner::User(user)),
        (None, Some(session)) => Ok(CartOwner::Session(session)),
        (None, None) => Err(ApiError::BadRequest(
            "either user_id or session_id is required".to_string(),
        )),
    }
}

/// POST /carts/items: adds an item to the owner's cart, creating the
/// cart on first add. Returns the updated cart with recomputed totals.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<Cart>, ApiError>
where
    S: StorefrontStore + Clone + 'static,
    G: CarrierGateway + Clone + 'static,
{
    let owner = owner_from(req.user_id, req.session_id)?;
    let product = ProductDetails {
        product_id: ProductId::new(req.product_id),
        name: req.product_name,
        image: req.product_image,
        unit_price: Money::from_paise(req.unit_price_paise),
        category_id: req.category_id,
        weight_grams: req.weight_grams,
    };

    let cart = state
        .carts
        .add_item(&owner, product, req.quantity, req.color, req.size)
        .await?;
    Ok(Json(cart))
}

/// DELETE /carts/{id}/items: removes the line matching product and
/// variant selection.
#[tracing::instrument(skip(state, req))]
pub async fn remove_item<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RemoveItemRequest>,
) -> Result<Json<Cart>, ApiError>
where
    S: StorefrontStore + Clone + 'static,
    G: CarrierGateway + Clone + 'static,
{
    let cart = state
        .carts
        .remove_item(
            CartId::from_uuid(id),
            &ProductId::new(req.product_id),
            req.color.as_deref(),
            req.size.as_deref(),
        )
        .await?;
    Ok(Json(cart))
}

/// POST /carts/{id}/coupon: validates and applies a coupon code,
/// returning the cart with updated totals.
#[tracing::instrument(skip(state, req))]
pub async fn apply_coupon<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplyCouponRequest>,
) -> Result<Json<Cart>, ApiError>
where
    S: StorefrontStore + Clone + 'static,
    G: CarrierGateway + Clone + 'static,
{
    let cart = state
        .carts
        .apply_coupon(CartId::from_uuid(id), &req.coupon_code)
        .await?;
    Ok(Json(cart))
}
