//! # Payment Types
//!
//! Payment records as reported by the provider, and the provider's push
//! notifications. This system only observes payment status; transitions are
//! owned by the provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payment status as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    InProcess,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
    /// Any status this system does not model (authorized, in_mediation, ...)
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::InProcess => "in_process",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Unknown => "unknown",
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, PaymentStatus::Approved)
    }

    /// Customer-facing description of a status that does not fulfill
    pub fn describe(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Payment is pending",
            PaymentStatus::InProcess => "Payment is being reviewed",
            PaymentStatus::Approved => "Payment approved",
            PaymentStatus::Rejected => "Payment was rejected",
            PaymentStatus::Cancelled => "Payment was cancelled",
            PaymentStatus::Refunded => "Payment was refunded",
            PaymentStatus::Unknown => "Payment status is not recognized",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative payment record fetched from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Provider-assigned payment identifier
    pub id: String,

    pub status: PaymentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_amount: Option<f64>,

    /// Correlation reference chosen when the checkout was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,

    /// Email the payer used on the provider's page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,

    /// Customer and product data embedded at checkout
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentRecord {
    pub fn new(id: impl Into<String>, status: PaymentStatus) -> Self {
        Self {
            id: id.into(),
            status,
            status_detail: None,
            transaction_amount: None,
            external_reference: None,
            payer_email: None,
            metadata: HashMap::new(),
        }
    }

    /// Builder: add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builder: set correlation reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.external_reference = Some(reference.into());
        self
    }

    /// Builder: set amount
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.transaction_amount = Some(amount);
        self
    }

    /// Non-blank metadata value
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Notification category that carries payment updates
pub const PAYMENT_TOPIC: &str = "payment";

/// A provider push notification, normalized from query string and body.
///
/// The provider sends `{"type": "payment", "action": "...", "data": {"id": "..."}}`
/// in the body, and older feeds put `topic`/`type` and `id`/`data.id` in the
/// query string. Query values win when both are present, except that a body
/// typed `payment` is a payment notification whatever the query topic says.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentNotification {
    pub topic: Option<String>,
    pub action: Option<String>,
    pub resource_id: Option<String>,
}

impl PaymentNotification {
    /// Build from request parts. A body that is not JSON is treated as empty.
    pub fn from_request(query: &HashMap<String, String>, body: &[u8]) -> Self {
        let body: serde_json::Value = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(body).unwrap_or(serde_json::Value::Null)
        };

        let query_value = |key: &str| {
            query
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let query_topic = query_value("topic").or_else(|| query_value("type"));
        let body_topic = scalar_to_string(body.get("type"));
        let body_id = scalar_to_string(body.get("data").and_then(|d| d.get("id")));

        // Either source naming a payment is enough.
        let body_is_payment = body_topic.as_deref() == Some(PAYMENT_TOPIC)
            && query_topic.as_deref() != Some(PAYMENT_TOPIC);

        let topic = if body_is_payment {
            body_topic
        } else {
            query_topic.or(body_topic)
        };

        let action = scalar_to_string(body.get("action"));

        let resource_id = if body_is_payment && body_id.is_some() {
            body_id
        } else {
            query_value("id")
                .or_else(|| query_value("data.id"))
                .or(body_id)
        };

        Self {
            topic,
            action,
            resource_id,
        }
    }

    /// Whether this notification is about a payment
    pub fn is_payment(&self) -> bool {
        self.topic.as_deref() == Some(PAYMENT_TOPIC)
    }
}

/// Strings pass through; numbers and booleans are stringified; anything else is dropped.
pub fn scalar_to_string(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
