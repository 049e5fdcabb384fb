//! # Resend Gateway
//!
//! Sends delivery emails through the Resend HTTP API. Attachments travel
//! base64-encoded inside the JSON body.

use crate::config::ResendConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use deliver_core::{
    FulfillmentError, FulfillmentResult, GatewayError, GatewayReceipt, NotificationGateway,
    OutboundEmail,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

pub struct ResendGateway {
    config: ResendConfig,
    client: Client,
}

impl ResendGateway {
    pub fn new(config: ResendConfig) -> FulfillmentResult<Self> {
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
        Self::new(ResendConfig::from_env()?)
    }

    pub fn config(&self) -> &ResendConfig {
        &self.config
    }

    fn build_request<'a>(&'a self, email: &'a OutboundEmail) -> ResendEmailRequest<'a> {
        ResendEmailRequest {
            from: self.config.from_header(),
            to: vec![email.to.as_str()],
            subject: &email.subject,
            html: &email.html_body,
            reply_to: self.config.reply_to.as_deref(),
            attachments: email
                .attachments
                .iter()
                .map(|a| ResendAttachment {
                    filename: &a.filename,
                    content: STANDARD.encode(&a.content),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl NotificationGateway for ResendGateway {
    #[instrument(skip(self, email), fields(to = %email.to, attachments = email.attachments.len()))]
    async fn send(&self, email: &OutboundEmail) -> Result<GatewayReceipt, GatewayError> {
        let request = self.build_request(email);
        let url = format!("{}/emails", self.config.api_base_url);

        debug!("Sending email via Resend: subject={}", email.subject);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            error!("Resend API error: status={}, body={}", status, body);
            let message = serde_json::from_str::<ResendErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Auth(message),
                StatusCode::TOO_MANY_REQUESTS => GatewayError::Transport(message),
                s if s.is_server_error() => GatewayError::Transport(message),
                _ => GatewayError::Content(message),
            });
        }

        let message_id = serde_json::from_str::<ResendEmailResponse>(&body)
            .ok()
            .and_then(|r| r.id);

        info!("Resend accepted email: id={:?}", message_id);
        Ok(GatewayReceipt::accepted(message_id))
    }

    fn gateway_name(&self) -> &'static str {
        "resend"
    }
}

// =============================================================================
// Resend API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: String,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    attachments: Vec<ResendAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct ResendAttachment<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendErrorResponse {
    #[serde(default)]
    message: Option<String>,
}
