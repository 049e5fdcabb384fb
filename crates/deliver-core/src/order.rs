//! # Order Types
//!
//! Checkout orders sent to the provider, and the validated fulfillment order
//! rebuilt from the provider's payment record afterwards.
//!
//! Everything the fulfillment step needs travels through the provider as
//! metadata under the keys in [`metadata_keys`].

use crate::payment::PaymentRecord;
use crate::product::ProductCatalog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata keys embedded at checkout and read back at fulfillment
pub mod metadata_keys {
    pub const CUSTOMER_EMAIL: &str = "customer_email";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const PRODUCT_ID: &str = "product_id";
    pub const PRODUCT_TITLE: &str = "product_title";
}

/// Prefix of generated correlation references
pub const REFERENCE_PREFIX: &str = "order";

/// Generate a correlation reference: `order_<product_id>_<random>`
pub fn generate_reference(product_id: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", REFERENCE_PREFIX, product_id, &suffix[..12])
}

/// Recover the product id from a `<prefix>_<product_id>_<suffix>` reference
pub fn product_from_reference(reference: &str) -> Option<&str> {
    let (_, rest) = reference.split_once('_')?;
    let (product_id, _) = rest.rsplit_once('_')?;
    (!product_id.is_empty()).then_some(product_id)
}

/// Loose address check: something before and after a single `@`, no spaces
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// A purchase to send to the provider's hosted checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOrder {
    pub product_id: String,
    pub title: String,
    /// Unit price in the store currency
    pub unit_price: f64,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Correlation reference (generated)
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl CheckoutOrder {
    /// Create an order for one product with a generated reference
    pub fn new(product_id: impl Into<String>, title: impl Into<String>, unit_price: f64) -> Self {
        let product_id = product_id.into();
        Self {
            reference: generate_reference(&product_id),
            product_id,
            title: title.into(),
            unit_price,
            quantity: 1,
            buyer_email: None,
            first_name: None,
            last_name: None,
            created_at: Utc::now(),
        }
    }

    /// Builder: set quantity
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Builder: set buyer email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.buyer_email = Some(email.into());
        self
    }

    /// Builder: set customer name
    pub fn with_name(mut self, first: Option<String>, last: Option<String>) -> Self {
        self.first_name = first;
        self.last_name = last;
        self
    }

    /// Metadata to embed with the provider
    pub fn metadata(&self) -> Vec<(&'static str, String)> {
        let mut metadata = vec![
            (metadata_keys::PRODUCT_ID, self.product_id.clone()),
            (metadata_keys::PRODUCT_TITLE, self.title.clone()),
        ];
        if let Some(ref email) = self.buyer_email {
            metadata.push((metadata_keys::CUSTOMER_EMAIL, email.clone()));
        }
        if let Some(ref first) = self.first_name {
            metadata.push((metadata_keys::FIRST_NAME, first.clone()));
        }
        if let Some(ref last) = self.last_name {
            metadata.push((metadata_keys::LAST_NAME, last.clone()));
        }
        metadata
    }

    /// Total in the store currency
    pub fn total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// A checkout session created by the payment provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session (preference) ID
    pub session_id: String,

    /// Provider name (e.g., "mercadopago")
    pub provider: String,

    /// URL to redirect the customer to
    pub checkout_url: String,

    /// Sandbox URL, when the provider offers one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_checkout_url: Option<String>,

    /// Correlation reference sent with the session
    pub reference: String,

    pub created_at: DateTime<Utc>,
}

/// Why an approved payment cannot be delivered without intervention
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockedReason {
    /// No customer email in metadata or payer data
    MissingRecipient,
    /// Customer email present but not an address
    InvalidRecipient { email: String },
    /// No product id in metadata or reference
    MissingProduct,
    /// None of the product's files exist
    NoDeliverableFiles { product_id: String },
}

impl std::fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockedReason::MissingRecipient => write!(f, "missing recipient"),
            BlockedReason::InvalidRecipient { email } => {
                write!(f, "invalid recipient address: {}", email)
            }
            BlockedReason::MissingProduct => write!(f, "missing product identifier"),
            BlockedReason::NoDeliverableFiles { product_id } => {
                write!(f, "no deliverable files for product {}", product_id)
            }
        }
    }
}

/// Validated order data for delivering a paid product
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FulfillmentOrder {
    pub payment_id: String,
    pub recipient_email: String,
    pub recipient_name: String,
    pub product_id: String,
    pub product_title: String,
    pub reference: Option<String>,
}

impl FulfillmentOrder {
    /// Extract and validate order data from an approved payment.
    ///
    /// Email comes from metadata, then the payer; the product from metadata,
    /// then the correlation reference. Title and name fall back to the
    /// catalog title and the email's local part.
    pub fn from_payment(
        payment: &PaymentRecord,
        catalog: &ProductCatalog,
    ) -> Result<Self, BlockedReason> {
        let email = payment
            .metadata_value(metadata_keys::CUSTOMER_EMAIL)
            .or_else(|| {
                payment
                    .payer_email
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
            })
            .ok_or(BlockedReason::MissingRecipient)?;

        if !is_valid_email(email) {
            return Err(BlockedReason::InvalidRecipient {
                email: email.to_string(),
            });
        }

        let product_id = payment
            .metadata_value(metadata_keys::PRODUCT_ID)
            .or_else(|| {
                payment
                    .external_reference
                    .as_deref()
                    .and_then(product_from_reference)
            })
            .ok_or(BlockedReason::MissingProduct)?;

        let product_title = payment
            .metadata_value(metadata_keys::PRODUCT_TITLE)
            .or_else(|| catalog.title(product_id))
            .unwrap_or(product_id);

        let recipient_name = payment
            .metadata_value(metadata_keys::FIRST_NAME)
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());

        Ok(Self {
            payment_id: payment.id.clone(),
            recipient_email: email.to_string(),
            recipient_name,
            product_id: product_id.to_string(),
            product_title: product_title.to_string(),
            reference: payment.external_reference.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentStatus;

    fn approved() -> PaymentRecord {
        PaymentRecord::new("123", PaymentStatus::Approved)
    }

    #[test]
    fn test_reference_round_trips_product() {
        let reference = generate_reference("tracker-habitos");
        assert!(reference.starts_with("order_tracker-habitos_"));
        assert_eq!(product_from_reference(&reference), Some("tracker-habitos"));

        assert_eq!(
            product_from_reference("alexcel_pack-productividad_2450"),
            Some("pack-productividad")
        );
        assert_eq!(product_from_reference("nounderscore"), None);
        assert_eq!(product_from_reference("a__b"), None);
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[test]
    fn test_checkout_metadata() {
        let order = CheckoutOrder::new("tracker-habitos", "Tracker", 2450.0)
            .with_email("a@b.com")
            .with_name(Some("Ana".into()), None)
            .with_quantity(2);

        let metadata = order.metadata();
        assert!(metadata.contains(&(metadata_keys::PRODUCT_ID, "tracker-habitos".to_string())));
        assert!(metadata.contains(&(metadata_keys::CUSTOMER_EMAIL, "a@b.com".to_string())));
        assert!(metadata.contains(&(metadata_keys::FIRST_NAME, "Ana".to_string())));
        assert_eq!(order.total(), 4900.0);
    }

    #[test]
    fn test_fulfillment_order_from_metadata() {
        let payment = approved()
            .with_metadata("customer_email", "a@b.com")
            .with_metadata("first_name", "Ana")
            .with_metadata("product_id", "tracker-habitos")
            .with_metadata("product_title", "Tracker de Hábitos");

        let order = FulfillmentOrder::from_payment(&payment, &ProductCatalog::builtin()).unwrap();
        assert_eq!(order.recipient_email, "a@b.com");
        assert_eq!(order.recipient_name, "Ana");
        assert_eq!(order.product_id, "tracker-habitos");
        assert_eq!(order.product_title, "Tracker de Hábitos");
    }

    #[test]
    fn test_fulfillment_order_fallbacks() {
        let mut payment = approved().with_reference("order_pack-productividad_abc123");
        payment.payer_email = Some("buyer@mail.com".into());

        let order = FulfillmentOrder::from_payment(&payment, &ProductCatalog::builtin()).unwrap();
        assert_eq!(order.recipient_email, "buyer@mail.com");
        assert_eq!(order.recipient_name, "buyer");
        assert_eq!(order.product_id, "pack-productividad");
        assert_eq!(order.product_title, "Pack Productividad");
    }

    #[test]
    fn test_fulfillment_order_blocked() {
        let catalog = ProductCatalog::builtin();

        let missing = approved().with_metadata("product_id", "tracker-habitos");
        assert_eq!(
            FulfillmentOrder::from_payment(&missing, &catalog),
            Err(BlockedReason::MissingRecipient)
        );

        let malformed = approved()
            .with_metadata("customer_email", "not-an-email")
            .with_metadata("product_id", "tracker-habitos");
        assert!(matches!(
            FulfillmentOrder::from_payment(&malformed, &catalog),
            Err(BlockedReason::InvalidRecipient { .. })
        ));

        let no_product = approved().with_metadata("customer_email", "a@b.com");
        assert_eq!(
            FulfillmentOrder::from_payment(&no_product, &catalog),
            Err(BlockedReason::MissingProduct)
        );
    }
}
