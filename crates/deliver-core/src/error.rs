//! # Fulfillment Error Types
//!
//! Typed error handling for the checkout and fulfillment engine.
//! Provider and store operations return `Result<T, FulfillmentError>`;
//! the notification gateway has its own `GatewayError`.
//!
//! Business outcomes (payment not approved, already delivered, delivery
//! blocked or failed) are not errors: see [`crate::reconciler::ReconcileOutcome`].

use thiserror::Error;

/// Core error type for provider, store and reconciliation failures
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No payment identifier was supplied
    #[error("Missing payment identifier")]
    MissingIdentifier,

    /// Provider has no payment with this identifier
    #[error("Payment not found: {payment_id}")]
    PaymentNotFound { payment_id: String },

    /// Provider could not be reached or timed out
    #[error("Upstream unavailable [{provider}]: {message}")]
    UpstreamUnavailable { provider: String, message: String },

    /// Rate limited by provider
    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Processed-payment store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FulfillmentError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FulfillmentError::UpstreamUnavailable { .. }
                | FulfillmentError::RateLimited { .. }
                | FulfillmentError::Storage(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            FulfillmentError::Configuration(_) => 500,
            FulfillmentError::Validation(_) => 400,
            FulfillmentError::MissingIdentifier => 400,
            FulfillmentError::PaymentNotFound { .. } => 404,
            FulfillmentError::UpstreamUnavailable { .. } => 503,
            FulfillmentError::RateLimited { .. } => 429,
            FulfillmentError::ProviderError { .. } => 502,
            FulfillmentError::Serialization(_) => 502,
            FulfillmentError::Storage(_) => 503,
            FulfillmentError::Internal(_) => 500,
        }
    }

    /// Short machine-readable kind, used in webhook acknowledgements
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentError::Configuration(_) => "configuration",
            FulfillmentError::Validation(_) | FulfillmentError::MissingIdentifier => "validation",
            FulfillmentError::PaymentNotFound { .. } => "payment_not_found",
            FulfillmentError::UpstreamUnavailable { .. } => "upstream_unavailable",
            FulfillmentError::RateLimited { .. } => "rate_limited",
            FulfillmentError::ProviderError { .. } => "provider_error",
            FulfillmentError::Serialization(_) => "serialization",
            FulfillmentError::Storage(_) => "storage",
            FulfillmentError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for fulfillment operations
pub type FulfillmentResult<T> = Result<T, FulfillmentError>;

/// Failure reported by a notification gateway.
///
/// Transport and auth failures are about the channel; content failures mean
/// the message itself was refused and resending it unchanged will not help.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, timeout or 5xx from the email service
    #[error("Transport error: {0}")]
    Transport(String),

    /// Credentials rejected by the email service
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Message rejected (bad address, attachment too large, ...)
    #[error("Content rejected: {0}")]
    Content(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}
