//! # deliver-mercadopago
//!
//! Mercado Pago payment provider for the fulfillment service.
//!
//! - **MercadoPagoProvider**: Checkout Pro preferences (hosted checkout) and
//!   authoritative payment lookup by id
//! - **WebhookVerifier**: `x-signature` HMAC check for notifications
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deliver_mercadopago::MercadoPagoProvider;
//! use deliver_core::{CheckoutOrder, CheckoutUrls, PaymentProvider};
//!
//! let provider = MercadoPagoProvider::from_env()?;
//!
//! let order = CheckoutOrder::new("tracker-habitos", "Tracker de Hábitos", 2450.0)
//!     .with_email("ana@example.com");
//! let session = provider
//!     .create_checkout(&order, &CheckoutUrls::new("https://datosconalex.com"))
//!     .await?;
//!
//! // Redirect the customer to session.checkout_url
//! ```

pub mod config;
pub mod provider;
pub mod signature;

// Re-exports
pub use config::MercadoPagoConfig;
pub use provider::MercadoPagoProvider;
pub use signature::{SignatureError, WebhookVerifier};
