//! # Webhook Signature Verification
//!
//! Mercado Pago signs notifications with an `x-signature` header of the form
//! `ts=<unix ts>,v1=<hex hmac>`. The HMAC-SHA256 is computed with the
//! webhook secret over the manifest
//! `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`, where segments whose
//! value is absent are left out.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing x-signature header")]
    MissingHeader,

    #[error("malformed x-signature header: {0}")]
    Malformed(String),

    #[error("signature mismatch")]
    Mismatch,
}

/// Parsed `x-signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

pub fn parse_signature_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut ts = None;
    let mut v1 = None;

    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim() {
            "ts" => ts = Some(value.trim().to_string()),
            "v1" => v1 = Some(value.trim().to_string()),
            _ => {}
        }
    }

    match (ts, v1) {
        (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Ok(SignatureHeader { ts, v1 }),
        (None, _) => Err(SignatureError::Malformed("no ts".to_string())),
        _ => Err(SignatureError::Malformed("no v1".to_string())),
    }
}

/// Build the signed manifest. Alphanumeric resource ids are lowercased.
pub fn signature_manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = String::new();
    if let Some(id) = data_id.filter(|id| !id.is_empty()) {
        let id = if id.chars().all(char::is_alphanumeric) {
            id.to_lowercase()
        } else {
            id.to_string()
        };
        manifest.push_str(&format!("id:{};", id));
    }
    if let Some(request_id) = request_id.filter(|r| !r.is_empty()) {
        manifest.push_str(&format!("request-id:{};", request_id));
    }
    manifest.push_str(&format!("ts:{};", ts));
    manifest
}

/// Checks notification signatures against the configured secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verify a notification given its `x-signature` and `x-request-id`
    /// headers and the `data.id` it refers to.
    pub fn verify(
        &self,
        signature: Option<&str>,
        request_id: Option<&str>,
        data_id: Option<&str>,
    ) -> Result<(), SignatureError> {
        let header = parse_signature_header(signature.ok_or(SignatureError::MissingHeader)?)?;
        let manifest = signature_manifest(data_id, request_id, &header.ts);

        let expected = hex::decode(&header.v1).map_err(|_| SignatureError::Mismatch)?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;
        mac.update(manifest.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Produce a header value for a manifest (used by tests and local tooling)
    pub fn sign(&self, data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
        let manifest = signature_manifest(data_id, request_id, ts);
        let digest = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mut mac) => {
                mac.update(manifest.as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }
            Err(_) => String::new(),
        };
        format!("ts={},v1={}", ts, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("ts=1704908010,v1=abc123").unwrap();
        assert_eq!(parsed.ts, "1704908010");
        assert_eq!(parsed.v1, "abc123");

        let spaced = parse_signature_header(" ts=1 , v1=ff ").unwrap();
        assert_eq!(spaced.v1, "ff");

        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("ts=1").is_err());
        assert!(parse_signature_header("garbage").is_err());
    }

    #[test]
    fn test_manifest() {
        assert_eq!(
            signature_manifest(Some("123"), Some("req-1"), "1700"),
            "id:123;request-id:req-1;ts:1700;"
        );
        assert_eq!(
            signature_manifest(Some("ABC123"), None, "1700"),
            "id:abc123;ts:1700;"
        );
        assert_eq!(signature_manifest(None, None, "1700"), "ts:1700;");
    }

    #[test]
    fn test_verify_round_trip() {
        let verifier = WebhookVerifier::new("secret");
        let header = verifier.sign(Some("123"), Some("req-1"), "1700");

        assert!(verifier
            .verify(Some(&header), Some("req-1"), Some("123"))
            .is_ok());
        assert_eq!(
            verifier.verify(Some(&header), Some("req-2"), Some("123")),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            WebhookVerifier::new("other").verify(Some(&header), Some("req-1"), Some("123")),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_rejects_missing_or_bad_header() {
        let verifier = WebhookVerifier::new("secret");
        assert_eq!(
            verifier.verify(None, None, Some("123")),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verifier.verify(Some("ts=1,v1=not-hex"), None, Some("123")),
            Err(SignatureError::Mismatch)
        );
    }
}
