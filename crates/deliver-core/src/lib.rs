//! # deliver-core
//!
//! Core types and traits for the digital-file fulfillment service.
//!
//! This crate provides:
//! - `PaymentProvider` trait for hosted-checkout payment providers
//! - `NotificationGateway` trait for outbound email
//! - `ProductCatalog` mapping products to deliverable files, and `FileStore`
//! - `FulfillmentDispatcher`, which attaches the files and sends one email
//! - `PaymentReconciler`, which fulfills each approved payment exactly once
//! - `FulfillmentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use deliver_core::{FulfillmentDispatcher, InMemoryProcessedStore, PaymentReconciler};
//!
//! let dispatcher = FulfillmentDispatcher::new(catalog, files, gateway);
//! let reconciler = PaymentReconciler::new(provider, Arc::new(dispatcher), Arc::new(InMemoryProcessedStore::new()));
//!
//! // Customer came back from the checkout page
//! let result = reconciler.confirm(Some("123456")).await?;
//! if result.email_sent() {
//!     // files are in the customer's inbox
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod files;
pub mod gateway;
pub mod order;
pub mod payment;
pub mod product;
pub mod provider;
pub mod reconciler;
pub mod render;
pub mod store;

// Re-exports for convenience
pub use dispatcher::{DeliveryOutcome, FulfillmentAttempt, FulfillmentDispatcher};
pub use error::{FulfillmentError, FulfillmentResult, GatewayError};
pub use files::{
    check_product_files, BoxedFileStore, DirectoryFileStore, FileCheck, FileInfo, FileStore,
    MemoryFileStore, ProductFilesCheck,
};
pub use gateway::{
    Attachment, BoxedNotificationGateway, GatewayReceipt, NotificationGateway, OutboundEmail,
};
pub use order::{
    metadata_keys, BlockedReason, CheckoutOrder, CheckoutSession, FulfillmentOrder,
};
pub use payment::{PaymentNotification, PaymentRecord, PaymentStatus};
pub use product::{Product, ProductCatalog};
pub use provider::{BoxedPaymentProvider, CheckoutUrls, PaymentProvider};
pub use reconciler::{AckStatus, PaymentReconciler, ReconcileOutcome, Reconciliation, WebhookAck};
pub use render::EmailBranding;
pub use store::{BoxedProcessedStore, InMemoryProcessedStore, PaymentLocks, ProcessedStore};
