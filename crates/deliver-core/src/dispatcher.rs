//! # Fulfillment Dispatcher
//!
//! Turns a validated order into one delivery email: resolve the product's
//! files, keep the ones that exist, render the message, hand it to the
//! gateway. Failures never escape as errors; every path ends in a
//! [`FulfillmentAttempt`] whose outcome says what happened.
//!
//! Delivery is fail-closed: if none of the product's files can be read the
//! gateway is not called at all.

use crate::files::BoxedFileStore;
use crate::gateway::{Attachment, BoxedNotificationGateway, OutboundEmail};
use crate::order::{is_valid_email, FulfillmentOrder};
use crate::product::ProductCatalog;
use crate::render::{render_delivery_email, EmailBranding};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Default bound on a single gateway send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Gateway accepted the message
    Delivered {
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    /// Order data failed validation; nothing was sent
    InvalidOrder { reason: String },
    /// None of the product's files could be attached; nothing was sent
    NoAttachments,
    /// Gateway answered but did not accept the message
    NotAccepted,
    /// Gateway errored or timed out
    GatewayFailed { message: String, retryable: bool },
}

/// A delivery attempt, kept for the caller's logs and response
#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentAttempt {
    pub payment_id: String,
    pub product_id: String,
    /// Files attached to the message (empty if nothing was sent)
    pub files: Vec<String>,
    pub outcome: DeliveryOutcome,
    pub attempted_at: DateTime<Utc>,
}

impl FulfillmentAttempt {
    fn new(order: &FulfillmentOrder, files: Vec<String>, outcome: DeliveryOutcome) -> Self {
        Self {
            payment_id: order.payment_id.clone(),
            product_id: order.product_id.clone(),
            files,
            outcome,
            attempted_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }
}

/// Delivers purchased files through the notification gateway
pub struct FulfillmentDispatcher {
    catalog: Arc<ProductCatalog>,
    files: BoxedFileStore,
    gateway: BoxedNotificationGateway,
    branding: EmailBranding,
    send_timeout: Duration,
}

impl FulfillmentDispatcher {
    pub fn new(
        catalog: Arc<ProductCatalog>,
        files: BoxedFileStore,
        gateway: BoxedNotificationGateway,
    ) -> Self {
        Self {
            catalog,
            files,
            gateway,
            branding: EmailBranding::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Builder: set email branding
    pub fn with_branding(mut self, branding: EmailBranding) -> Self {
        self.branding = branding;
        self
    }

    /// Builder: set the gateway send timeout
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    /// Send the order's files to its recipient in one message.
    #[instrument(
        skip(self, order),
        fields(payment_id = %order.payment_id, product_id = %order.product_id)
    )]
    pub async fn deliver(&self, order: &FulfillmentOrder) -> FulfillmentAttempt {
        if let Err(reason) = validate_order(order) {
            error!("Refusing delivery: {}", reason);
            return FulfillmentAttempt::new(order, Vec::new(), DeliveryOutcome::InvalidOrder { reason });
        }

        let attachments = self.collect_attachments(&order.product_id).await;
        if attachments.is_empty() {
            error!(
                "CRITICAL: no valid files to attach for product {}, aborting delivery",
                order.product_id
            );
            return FulfillmentAttempt::new(order, Vec::new(), DeliveryOutcome::NoAttachments);
        }

        let filenames: Vec<String> = attachments.iter().map(|a| a.filename.clone()).collect();
        let rendered = render_delivery_email(order, &filenames, &self.branding);
        let email = OutboundEmail {
            to: order.recipient_email.clone(),
            subject: rendered.subject,
            html_body: rendered.html_body,
            attachments,
        };

        info!(
            "Sending via {}: to={}, attachments={}",
            self.gateway.gateway_name(),
            email.to,
            filenames.len()
        );

        let outcome = match tokio::time::timeout(self.send_timeout, self.gateway.send(&email)).await
        {
            Ok(Ok(receipt)) if receipt.accepted => {
                info!("Delivery accepted: message_id={:?}", receipt.message_id);
                DeliveryOutcome::Delivered {
                    message_id: receipt.message_id,
                }
            }
            Ok(Ok(_)) => {
                error!("Gateway did not accept the message");
                DeliveryOutcome::NotAccepted
            }
            Ok(Err(e)) => {
                error!("Gateway error: {}", e);
                DeliveryOutcome::GatewayFailed {
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                }
            }
            Err(_) => {
                error!("Gateway send timed out after {:?}", self.send_timeout);
                DeliveryOutcome::GatewayFailed {
                    message: format!("send timed out after {}s", self.send_timeout.as_secs()),
                    retryable: true,
                }
            }
        };

        FulfillmentAttempt::new(order, filenames, outcome)
    }

    /// Read every resolvable file that exists; missing or unreadable ones are skipped
    async fn collect_attachments(&self, product_id: &str) -> Vec<Attachment> {
        let candidates = self.catalog.resolve_files(product_id);
        info!("Preparing delivery: {} candidate file(s)", candidates.len());

        let mut attachments = Vec::with_capacity(candidates.len());
        for name in candidates {
            if self.files.stat(&name).await.is_none() {
                error!("File not found: {}", self.files.location(&name));
                continue;
            }
            match self.files.read(&name).await {
                Ok(content) => {
                    info!(
                        "Attached {} ({:.1} KB)",
                        name,
                        content.len() as f64 / 1024.0
                    );
                    attachments.push(Attachment {
                        filename: name,
                        content,
                    });
                }
                Err(e) => warn!("Could not read {}: {}", self.files.location(&name), e),
            }
        }
        attachments
    }
}

fn validate_order(order: &FulfillmentOrder) -> Result<(), String> {
    if !is_valid_email(&order.recipient_email) {
        return Err(format!(
            "invalid recipient address: {:?}",
            order.recipient_email
        ));
    }
    if order.product_id.trim().is_empty() {
        return Err("empty product identifier".to_string());
    }
    Ok(())
}
