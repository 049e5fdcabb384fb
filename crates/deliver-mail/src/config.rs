//! Email configuration (Resend)

use deliver_core::FulfillmentError;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.resend.com";

#[derive(Debug, Clone)]
pub struct ResendConfig {
    /// Resend API key (re_...)
    pub api_key: String,

    /// From email address
    pub from_email: String,

    /// From name
    pub from_name: String,

    /// Reply-To address, if different from the sender
    pub reply_to: Option<String>,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// HTTP client timeout
    pub timeout: Duration,
}

impl ResendConfig {
    /// Load configuration from environment variables.
    ///
    /// Required: `RESEND_API_KEY`.
    /// Optional: `DEFAULT_FROM_EMAIL`, `EMAIL_FROM_NAME`, `EMAIL_REPLY_TO`,
    /// `EMAIL_SEND_TIMEOUT_SECS` (default 30).
    pub fn from_env() -> Result<Self, FulfillmentError> {
        dotenvy::dotenv().ok();

        let mut config = Self::new(env::var("RESEND_API_KEY").unwrap_or_default().trim());

        if let Some(from) = non_empty_var("DEFAULT_FROM_EMAIL") {
            config.from_email = from;
        }
        if let Some(name) = non_empty_var("EMAIL_FROM_NAME") {
            config.from_name = name;
        }
        config.reply_to = non_empty_var("EMAIL_REPLY_TO");

        if let Some(raw) = non_empty_var("EMAIL_SEND_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| {
                FulfillmentError::Configuration(format!(
                    "EMAIL_SEND_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                    raw
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from_email: "onboarding@resend.dev".to_string(),
            from_name: "Datos con Alex".to_string(),
            reply_to: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Get formatted "From" header value
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// Validate email configuration
    pub fn validate(&self) -> Result<(), FulfillmentError> {
        if self.api_key.is_empty() {
            return Err(FulfillmentError::Configuration(
                "RESEND_API_KEY not set".to_string(),
            ));
        }
        if !self.api_key.starts_with("re_") {
            return Err(FulfillmentError::Configuration(
                "RESEND_API_KEY must start with re_".to_string(),
            ));
        }
        if !self.from_email.contains('@') {
            return Err(FulfillmentError::Configuration(
                "DEFAULT_FROM_EMAIL is not an email address".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder: set sender
    pub fn with_sender(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.from_name = name.into();
        self.from_email = email.into();
        self
    }

    /// Builder: set Reply-To
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header() {
        let config = ResendConfig::new("re_abc").with_sender("Datos con Alex", "hola@datosconalex.com");
        assert_eq!(config.from_header(), "Datos con Alex <hola@datosconalex.com>");
    }

    #[test]
    fn test_validation_missing_api_key() {
        assert!(ResendConfig::new("").validate().is_err());
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        assert!(ResendConfig::new("sk_xxx").validate().is_err());
    }

    #[test]
    fn test_validation_invalid_from_email() {
        let config = ResendConfig::new("re_xxx").with_sender("Shop", "invalid-email");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        let config = ResendConfig::new("re_abcd1234").with_reply_to("soporte@datosconalex.com");
        assert!(config.validate().is_ok());
        assert_eq!(config.auth_header(), "Bearer re_abcd1234");
    }
}
