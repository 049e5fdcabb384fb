//! # Request Handlers
//!
//! Axum request handlers for checkout creation, the two payment confirmation
//! entry points and diagnostics.
//!
//! Both confirmation handlers run the reconciliation in a spawned task: a
//! client that disconnects mid-request cannot cancel a send halfway.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use deliver_core::order::is_valid_email;
use deliver_core::{
    check_product_files, CheckoutOrder, FulfillmentError, PaymentNotification, ProductFilesCheck,
    WebhookAck,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create preference request
#[derive(Debug, Deserialize)]
pub struct CreatePreferenceRequest {
    #[serde(default, alias = "course_id")]
    pub product_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub buyer_email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

/// Create preference response
#[derive(Debug, Serialize)]
pub struct CreatePreferenceResponse {
    pub success: bool,
    /// Checkout URL (redirect the customer here)
    pub init_point: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_init_point: Option<String>,
    pub preference_id: String,
    pub external_reference: String,
}

/// Redirect confirmation response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub success: bool,
    pub status: String,
    pub payment_id: String,
    pub email_sent: bool,
    pub message: String,
    pub outcome: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn fulfillment_error_to_response(err: FulfillmentError) -> ApiError {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code).with_details(err.kind());
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(message, 400)),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "deliver",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create a hosted checkout session for one product
#[instrument(skip(state, payload))]
pub async fn create_preference(
    State(state): State<AppState>,
    payload: Result<Json<CreatePreferenceRequest>, JsonRejection>,
) -> Result<Json<CreatePreferenceResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;

    let product_id = request
        .product_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| bad_request("product_id is required"))?;

    if let Some(product) = state.catalog.get(product_id) {
        if !product.active {
            return Err(bad_request(format!(
                "Product is not available: {}",
                product_id
            )));
        }
    }

    let price = request
        .price
        .ok_or_else(|| bad_request("price is required"))?;

    let buyer_email = request
        .buyer_email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = buyer_email {
        if !is_valid_email(email) {
            return Err(bad_request(format!("Invalid buyer_email: {}", email)));
        }
    }

    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| state.catalog.title(product_id))
        .unwrap_or(product_id)
        .to_string();

    let non_blank = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut order = CheckoutOrder::new(product_id, title, price)
        .with_quantity(request.quantity)
        .with_name(non_blank(&request.first_name), non_blank(&request.last_name));
    if let Some(email) = buyer_email {
        order = order.with_email(email);
    }

    info!(
        "Creating checkout: product={}, total={}, reference={}",
        order.product_id,
        order.total(),
        order.reference
    );

    let session = state
        .provider
        .create_checkout(&order, &state.urls)
        .await
        .map_err(|e| {
            error!("Failed to create checkout: {}", e);
            fulfillment_error_to_response(e)
        })?;

    info!("Created checkout session: {}", session.session_id);

    Ok(Json(CreatePreferenceResponse {
        success: true,
        init_point: session.checkout_url,
        sandbox_init_point: session.sandbox_checkout_url,
        preference_id: session.session_id,
        external_reference: session.reference,
    }))
}

/// Customer returned from checkout: confirm the payment and deliver
#[instrument(skip(state, query))]
pub async fn validate_payment(
    State(state): State<AppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let payment_id = query
        .get("payment_id")
        .or_else(|| query.get("collection_id"))
        .cloned();

    let reconciler = state.reconciler.clone();
    let joined =
        tokio::spawn(async move { reconciler.confirm(payment_id.as_deref()).await }).await;

    let reconciliation = match joined {
        Ok(result) => result.map_err(|e| {
            warn!("Payment confirmation failed: {}", e);
            fulfillment_error_to_response(e)
        })?,
        Err(join_error) => {
            error!("Reconciliation task failed: {}", join_error);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(
                    ErrorResponse::new("Payment confirmation failed", 500)
                        .with_details(join_error.to_string()),
                ),
            ));
        }
    };

    Ok(Json(ValidateResponse {
        success: reconciliation.is_success(),
        status: reconciliation.status.as_str().to_string(),
        email_sent: reconciliation.email_sent(),
        message: reconciliation.message(),
        outcome: reconciliation.outcome.label(),
        payment_id: reconciliation.payment_id,
    }))
}

/// Provider notification. Always answers 200; the body says what happened.
#[instrument(skip(state, query, headers, body))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<WebhookAck>) {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let body = body.unwrap_or_default();
    let notification = PaymentNotification::from_request(&query, &body);

    info!(
        "Received notification: topic={:?}, action={:?}, id={:?}",
        notification.topic, notification.action, notification.resource_id
    );

    if let (Some(verifier), true) = (&state.webhook_verifier, notification.is_payment()) {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let data_id = query
            .get("data.id")
            .map(String::as_str)
            .or(notification.resource_id.as_deref());

        if let Err(e) = verifier.verify(header("x-signature"), header("x-request-id"), data_id) {
            warn!("Notification signature rejected: {}", e);
            return (
                StatusCode::OK,
                Json(WebhookAck::ignored(format!("signature rejected: {}", e))),
            );
        }
    }

    let reconciler = state.reconciler.clone();
    let ack = match tokio::spawn(async move { reconciler.handle_notification(&notification).await })
        .await
    {
        Ok(ack) => ack,
        Err(join_error) => {
            error!("Notification task failed: {}", join_error);
            WebhookAck::internal(format!("notification processing failed: {}", join_error))
        }
    };

    (StatusCode::OK, Json(ack))
}

/// Catalog and file-existence diagnostics
#[derive(Debug, Serialize)]
pub struct ProductsCheckResponse {
    pub files_dir: String,
    pub products: Vec<ProductFilesCheck>,
    pub all_files_exist: bool,
}

pub async fn products_check(State(state): State<AppState>) -> Json<ProductsCheckResponse> {
    let mut products = Vec::new();
    for product in state.catalog.active_products() {
        products.push(check_product_files(&state.catalog, state.files.as_ref(), &product.id).await);
    }

    Json(ProductsCheckResponse {
        files_dir: state.config.files_dir.display().to_string(),
        all_files_exist: products.iter().all(|p| p.all_files_exist),
        products,
    })
}

/// Which configuration is present (never secret values)
pub async fn env_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.environment.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400).with_details("validation");
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
        assert_eq!(err.details.as_deref(), Some("validation"));
    }

    #[test]
    fn test_fulfillment_error_conversion() {
        let (status, _json) = fulfillment_error_to_response(FulfillmentError::MissingIdentifier);
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _json) = fulfillment_error_to_response(FulfillmentError::PaymentNotFound {
            payment_id: "1".into(),
        });
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, json) = fulfillment_error_to_response(FulfillmentError::UpstreamUnavailable {
            provider: "mercadopago".into(),
            message: "timeout".into(),
        });
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json.details.as_deref(), Some("upstream_unavailable"));
    }

    #[test]
    fn test_create_request_accepts_course_id() {
        let request: CreatePreferenceRequest =
            serde_json::from_str(r#"{"course_id": "tracker-habitos", "price": 10}"#).unwrap();
        assert_eq!(request.product_id.as_deref(), Some("tracker-habitos"));
        assert_eq!(request.quantity, 1);
    }
}
