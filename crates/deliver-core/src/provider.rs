//! # Payment Provider Trait
//!
//! Seam between the fulfillment core and a hosted-checkout payment provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   PaymentProvider (trait)                   │
//! │  ├── create_checkout()                                      │
//! │  ├── get_payment()                                          │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                  ┌─────────┴─────────┐
//!                  │MercadoPagoProvider│
//!                  └───────────────────┘
//! ```

use crate::error::FulfillmentResult;
use crate::order::{CheckoutOrder, CheckoutSession};
use crate::payment::PaymentRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session and return its redirect URL.
    ///
    /// The order's correlation reference and metadata must be stored with the
    /// session so they come back on the resulting payment.
    async fn create_checkout(
        &self,
        order: &CheckoutOrder,
        urls: &CheckoutUrls,
    ) -> FulfillmentResult<CheckoutSession>;

    /// Fetch the authoritative state of a payment.
    ///
    /// Unreachable provider or timeouts must map to
    /// `FulfillmentError::UpstreamUnavailable`.
    async fn get_payment(&self, payment_id: &str) -> FulfillmentResult<PaymentRecord>;

    /// Get the provider name (for logging and routing).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared provider (dynamic dispatch)
pub type BoxedPaymentProvider = Arc<dyn PaymentProvider>;

/// URLs the provider redirects the customer back to
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the storefront (e.g., "https://datosconalex.com")
    pub base_url: String,
    /// Where the provider posts notifications, if configured
    pub notification_url: Option<String>,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            notification_url: None,
        }
    }

    /// Builder: set the webhook URL sent with each checkout
    pub fn with_notification_url(mut self, url: impl Into<String>) -> Self {
        self.notification_url = Some(url.into());
        self
    }

    fn return_url(&self, state: &str) -> String {
        format!("{}/?payment={}", self.base_url, state)
    }

    pub fn success_url(&self) -> String {
        self.return_url("success")
    }

    pub fn failure_url(&self) -> String {
        self.return_url("failure")
    }

    pub fn pending_url(&self) -> String {
        self.return_url("pending")
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_urls() {
        let urls = CheckoutUrls::new("https://datosconalex.com/");

        assert_eq!(urls.success_url(), "https://datosconalex.com/?payment=success");
        assert_eq!(urls.failure_url(), "https://datosconalex.com/?payment=failure");
        assert_eq!(urls.pending_url(), "https://datosconalex.com/?payment=pending");
        assert!(urls.notification_url.is_none());
    }
}
