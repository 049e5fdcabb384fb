//! # Mercado Pago Configuration
//!
//! Configuration management for the Mercado Pago integration.
//! Secrets are loaded from environment variables.

use deliver_core::FulfillmentError;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.mercadopago.com";

/// Mercado Pago API configuration
#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    /// Access token (TEST-... or APP_USR-...)
    pub access_token: String,

    /// Secret for webhook `x-signature` verification; unset disables the check
    pub webhook_secret: Option<String>,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// ISO currency of every preference item
    pub currency_id: String,

    /// Text shown on the buyer's card statement
    pub statement_descriptor: String,

    /// HTTP client timeout for every API call
    pub timeout: Duration,
}

impl MercadoPagoConfig {
    /// Load configuration from environment variables.
    ///
    /// Required: `MP_ACCESS_TOKEN`.
    /// Optional: `MP_WEBHOOK_SECRET`, `MP_CURRENCY` (default ARS),
    /// `MP_STATEMENT_DESCRIPTOR`, `PROVIDER_TIMEOUT_SECS` (default 10).
    pub fn from_env() -> Result<Self, FulfillmentError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let access_token = env::var("MP_ACCESS_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FulfillmentError::Configuration("MP_ACCESS_TOKEN not set".to_string()))?;

        if !access_token.starts_with("APP_USR-") && !access_token.starts_with("TEST-") {
            return Err(FulfillmentError::Configuration(
                "MP_ACCESS_TOKEN must start with APP_USR- or TEST-".to_string(),
            ));
        }

        let timeout_secs = match env::var("PROVIDER_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                FulfillmentError::Configuration(format!(
                    "PROVIDER_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                    raw
                ))
            })?,
            Err(_) => 10,
        };

        let mut config = Self::new(access_token).with_timeout(Duration::from_secs(timeout_secs));

        if let Some(secret) = non_empty_var("MP_WEBHOOK_SECRET") {
            config = config.with_webhook_secret(secret);
        }
        if let Some(currency) = non_empty_var("MP_CURRENCY") {
            config.currency_id = currency.to_uppercase();
        }
        if let Some(descriptor) = non_empty_var("MP_STATEMENT_DESCRIPTOR") {
            config.statement_descriptor = descriptor;
        }

        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            webhook_secret: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            currency_id: "ARS".to_string(),
            statement_descriptor: "ALEXCEL".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Check if using sandbox credentials
    pub fn is_test_mode(&self) -> bool {
        self.access_token.starts_with("TEST-")
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder: enable webhook signature verification
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Builder: set the HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
