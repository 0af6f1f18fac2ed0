//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use fulfillment::FulfillmentError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Cart or commit error.
    Checkout(CheckoutError),
    /// Fulfillment error surfaced to the client.
    Fulfillment(FulfillmentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::CartNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        // Coupon rejections carry the user-visible reason.
        CheckoutError::Coupon(_)
        | CheckoutError::EmptyCart
        | CheckoutError::AddressNotFound(_)
        | CheckoutError::InvalidSignature
        | CheckoutError::Domain(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::Store(inner) => {
            tracing::error!(error = %inner, "store error during checkout");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    match &err {
        FulfillmentError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        FulfillmentError::NotPaid(_) | FulfillmentError::MissingAwb(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        other => {
            tracing::error!(error = %other, "fulfillment error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Checkout(err.into())
    }
}
