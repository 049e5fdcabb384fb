//! # Notification Gateway
//!
//! "Send this message with these attachments to this address." The transport
//! behind it (email API, SMTP) is a deployment choice.

use crate::error::GatewayError;
use async_trait::async_trait;
use std::sync::Arc;

/// A file attached to an outbound message
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("bytes", &self.content.len())
            .finish()
    }
}

/// A rendered message ready to send
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

/// What the gateway reported back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    /// Whether the message was accepted for sending
    pub accepted: bool,
    /// Transport-assigned message id, when there is one
    pub message_id: Option<String>,
}

impl GatewayReceipt {
    pub fn accepted(message_id: Option<String>) -> Self {
        Self {
            accepted: true,
            message_id,
        }
    }

    pub fn not_accepted() -> Self {
        Self {
            accepted: false,
            message_id: None,
        }
    }
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Send one message with all of its attachments.
    async fn send(&self, email: &OutboundEmail) -> Result<GatewayReceipt, GatewayError>;

    fn gateway_name(&self) -> &'static str;
}

pub type BoxedNotificationGateway = Arc<dyn NotificationGateway>;
