//! # deliver-mail
//!
//! Notification gateway backed by the Resend email API.
//!
//! ```rust,ignore
//! use deliver_mail::ResendGateway;
//!
//! let gateway = ResendGateway::from_env()?;
//! let receipt = gateway.send(&email).await?;
//! ```

pub mod config;
pub mod resend;

pub use config::ResendConfig;
pub use resend::ResendGateway;
