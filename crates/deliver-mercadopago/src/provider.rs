//! # Mercado Pago Checkout Pro
//!
//! Preference creation (hosted checkout) and payment lookup against the
//! Mercado Pago REST API.

use crate::config::MercadoPagoConfig;
use async_trait::async_trait;
use chrono::Utc;
use deliver_core::payment::scalar_to_string;
use deliver_core::{
    CheckoutOrder, CheckoutSession, CheckoutUrls, FulfillmentError, FulfillmentResult,
    PaymentProvider, PaymentRecord, PaymentStatus,
};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

const PROVIDER: &str = "mercadopago";

/// Mercado Pago provider
///
/// Customers pay on Mercado Pago's hosted page; the payment is later looked
/// up by id to decide fulfillment.
pub struct MercadoPagoProvider {
    config: MercadoPagoConfig,
    client: Client,
}

impl MercadoPagoProvider {
    /// Create a new provider
    pub fn new(config: MercadoPagoConfig) -> FulfillmentResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                FulfillmentError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> FulfillmentResult<Self> {
        Self::new(MercadoPagoConfig::from_env()?)
    }

    pub fn config(&self) -> &MercadoPagoConfig {
        &self.config
    }

    fn validate_order(order: &CheckoutOrder) -> FulfillmentResult<()> {
        if order.product_id.trim().is_empty() {
            return Err(FulfillmentError::Validation(
                "product_id is required".to_string(),
            ));
        }
        if !order.unit_price.is_finite() || order.unit_price <= 0.0 {
            return Err(FulfillmentError::Validation(
                "price must be greater than zero".to_string(),
            ));
        }
        if order.quantity == 0 {
            return Err(FulfillmentError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn build_preference(&self, order: &CheckoutOrder, urls: &CheckoutUrls) -> MpPreferenceRequest {
        MpPreferenceRequest {
            items: vec![MpItem {
                id: order.product_id.clone(),
                title: order.title.clone(),
                description: format!("Digital product: {}", order.title),
                quantity: order.quantity,
                currency_id: self.config.currency_id.clone(),
                unit_price: order.unit_price,
            }],
            back_urls: MpBackUrls {
                success: urls.success_url(),
                failure: urls.failure_url(),
                pending: urls.pending_url(),
            },
            auto_return: "approved",
            external_reference: order.reference.clone(),
            statement_descriptor: self.config.statement_descriptor.clone(),
            metadata: order
                .metadata()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            payer: order
                .buyer_email
                .clone()
                .map(|email| MpPayerRequest { email }),
            notification_url: urls.notification_url.clone(),
        }
    }

    /// Map a non-success response to an error. `not_found` is used for 404.
    async fn error_from_response(
        response: Response,
        not_found: impl FnOnce() -> FulfillmentError,
    ) -> FulfillmentError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        error!("Mercado Pago API error: status={}, body={}", status, body);

        match status {
            StatusCode::NOT_FOUND => not_found(),
            StatusCode::TOO_MANY_REQUESTS => FulfillmentError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after_secs: retry_after.unwrap_or(60),
            },
            s if s.is_server_error() => FulfillmentError::UpstreamUnavailable {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}", s),
            },
            s => {
                let message = serde_json::from_str::<MpErrorResponse>(&body)
                    .ok()
                    .and_then(|e| e.message.or(e.error))
                    .unwrap_or_else(|| format!("HTTP {}: {}", s, body));
                FulfillmentError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message,
                }
            }
        }
    }

    fn transport_error(e: reqwest::Error) -> FulfillmentError {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else {
            e.to_string()
        };
        FulfillmentError::UpstreamUnavailable {
            provider: PROVIDER.to_string(),
            message,
        }
    }
}

#[async_trait]
impl PaymentProvider for MercadoPagoProvider {
    #[instrument(skip(self, order, urls), fields(product_id = %order.product_id, reference = %order.reference))]
    async fn create_checkout(
        &self,
        order: &CheckoutOrder,
        urls: &CheckoutUrls,
    ) -> FulfillmentResult<CheckoutSession> {
        Self::validate_order(order)?;

        let preference = self.build_preference(order, urls);
        debug!(
            "Creating Mercado Pago preference: total={} {}",
            order.total(),
            self.config.currency_id
        );

        let url = format!("{}/checkout/preferences", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("X-Idempotency-Key", &order.reference)
            .json(&preference)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, || {
                FulfillmentError::ProviderError {
                    provider: PROVIDER.to_string(),
                    message: "preference endpoint not found".to_string(),
                }
            })
            .await);
        }

        let created: MpPreferenceResponse = response.json().await.map_err(|e| {
            FulfillmentError::Serialization(format!(
                "Failed to parse Mercado Pago preference: {}",
                e
            ))
        })?;

        info!(
            "Created Mercado Pago preference: id={}, reference={}",
            created.id, order.reference
        );

        Ok(CheckoutSession {
            session_id: created.id,
            provider: PROVIDER.to_string(),
            checkout_url: created.init_point,
            sandbox_checkout_url: created.sandbox_init_point,
            reference: order.reference.clone(),
            created_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> FulfillmentResult<PaymentRecord> {
        // Ids are numeric; anything that cannot be a path segment cannot exist.
        if payment_id.is_empty()
            || !payment_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            warn!("Rejecting malformed payment id {:?}", payment_id);
            return Err(FulfillmentError::PaymentNotFound {
                payment_id: payment_id.to_string(),
            });
        }

        let url = format!("{}/v1/payments/{}", self.config.api_base_url, payment_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, || {
                FulfillmentError::PaymentNotFound {
                    payment_id: payment_id.to_string(),
                }
            })
            .await);
        }

        let payment: MpPayment = response.json().await.map_err(|e| {
            FulfillmentError::Serialization(format!("Failed to parse Mercado Pago payment: {}", e))
        })?;

        let record = payment.into_record(payment_id);
        debug!(
            "Fetched payment {}: status={}, reference={:?}",
            record.id, record.status, record.external_reference
        );
        Ok(record)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Mercado Pago API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct MpPreferenceRequest {
    items: Vec<MpItem>,
    back_urls: MpBackUrls,
    auto_return: &'static str,
    external_reference: String,
    statement_descriptor: String,
    metadata: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<MpPayerRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct MpItem {
    id: String,
    title: String,
    description: String,
    quantity: u32,
    currency_id: String,
    unit_price: f64,
}

#[derive(Debug, Serialize)]
struct MpBackUrls {
    success: String,
    failure: String,
    pending: String,
}

#[derive(Debug, Serialize)]
struct MpPayerRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
struct MpPreferenceResponse {
    id: String,
    init_point: String,
    #[serde(default)]
    sandbox_init_point: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MpPayment {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<PaymentStatus>,
    #[serde(default)]
    status_detail: Option<String>,
    #[serde(default)]
    transaction_amount: Option<f64>,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default)]
    payer: Option<MpPayer>,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct MpPayer {
    #[serde(default)]
    email: Option<String>,
}

impl MpPayment {
    fn into_record(self, requested_id: &str) -> PaymentRecord {
        let metadata = self
            .metadata
            .unwrap_or_default()
            .iter()
            .filter_map(|(k, v)| scalar_to_string(Some(v)).map(|v| (k.clone(), v)))
            .collect();

        PaymentRecord {
            id: scalar_to_string(self.id.as_ref()).unwrap_or_else(|| requested_id.to_string()),
            status: self.status.unwrap_or(PaymentStatus::Unknown),
            status_detail: self.status_detail,
            transaction_amount: self.transaction_amount,
            external_reference: self.external_reference.filter(|r| !r.trim().is_empty()),
            payer_email: self.payer.and_then(|p| p.email).filter(|e| !e.trim().is_empty()),
            metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MpErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}
