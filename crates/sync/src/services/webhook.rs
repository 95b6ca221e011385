//! Shopify webhook authentication and topic routing.
//!
//! Shopify signs each delivery with HMAC-SHA256 over the raw request body
//! using the app's shared secret and sends the digest base64-encoded in
//! `X-Shopify-Hmac-Sha256`. Some proxies re-encode it as hex, so both
//! encodings are accepted.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const HMAC_HEADER: &str = "X-Shopify-Hmac-Sha256";
/// Header naming the event topic.
pub const TOPIC_HEADER: &str = "X-Shopify-Topic";
/// Header carrying the unique delivery id.
pub const WEBHOOK_ID_HEADER: &str = "X-Shopify-Webhook-Id";

/// Webhook authentication failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing webhook signature")]
    MissingSignature,

    #[error("webhook signature mismatch")]
    InvalidSignature,
}

/// Product webhook topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookTopic {
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    /// Any topic this service does not act on.
    Other(String),
}

impl WebhookTopic {
    /// Parse an `X-Shopify-Topic` value. A missing topic is treated as an update.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("products/create") => Self::ProductCreate,
            Some("products/update") | None => Self::ProductUpdate,
            Some("products/delete") => Self::ProductDelete,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    /// Whether the payload carries a full product to propagate.
    #[must_use]
    pub const fn propagates(&self) -> bool {
        matches!(self, Self::ProductCreate | Self::ProductUpdate)
    }
}

impl std::fmt::Display for WebhookTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProductCreate => f.write_str("products/create"),
            Self::ProductUpdate => f.write_str("products/update"),
            Self::ProductDelete => f.write_str("products/delete"),
            Self::Other(topic) => f.write_str(topic),
        }
    }
}

/// Verify a webhook body against its signature header.
///
/// The digest comparison is constant time.
///
/// # Errors
///
/// Returns `WebhookError::MissingSignature` when the header is absent or
/// blank, and `WebhookError::InvalidSignature` when it does not match.
pub fn verify_webhook_signature(
    secret: &SecretString,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), WebhookError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::MissingSignature)?;

    // Hex digits are also valid base64, so try both decodings
    let candidates = [STANDARD.decode(signature).ok(), hex::decode(signature).ok()];

    for digest in candidates.into_iter().flatten() {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
            return Err(WebhookError::InvalidSignature);
        };
        mac.update(body);
        if mac.verify_slice(&digest).is_ok() {
            return Ok(());
        }
    }

    Err(WebhookError::InvalidSignature)
}

/// Compute the base64 signature Shopify would send for a body.
#[must_use]
pub fn sign_webhook_body(secret: &SecretString, body: &[u8]) -> String {
    HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map(|mut mac| {
            mac.update(body);
            STANDARD.encode(mac.finalize().into_bytes())
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("hush-7f3a9c2e41b8d605")
    }

    #[test]
    fn test_valid_base64_signature() {
        let body = br#"{"id":1}"#;
        let signature = sign_webhook_body(&secret(), body);
        assert!(verify_webhook_signature(&secret(), body, Some(&signature)).is_ok());
    }

    #[test]
    fn test_valid_hex_signature() {
        let body = br#"{"id":1}"#;
        let digest = STANDARD.decode(sign_webhook_body(&secret(), body)).unwrap();
        let signature = hex::encode(digest);
        assert!(verify_webhook_signature(&secret(), body, Some(&signature)).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let signature = sign_webhook_body(&secret(), br#"{"id":1}"#);
        assert_eq!(
            verify_webhook_signature(&secret(), br#"{"id":2}"#, Some(&signature)),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_or_garbage_signature() {
        assert_eq!(
            verify_webhook_signature(&secret(), b"{}", None),
            Err(WebhookError::MissingSignature)
        );
        assert_eq!(
            verify_webhook_signature(&secret(), b"{}", Some("  ")),
            Err(WebhookError::MissingSignature)
        );
        assert_eq!(
            verify_webhook_signature(&secret(), b"{}", Some("not a digest!")),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn test_topic_parsing() {
        assert_eq!(
            WebhookTopic::from_header(Some("products/delete")),
            WebhookTopic::ProductDelete
        );
        assert!(WebhookTopic::from_header(None).propagates());
        let other = WebhookTopic::from_header(Some("orders/create"));
        assert!(!other.propagates());
        assert_eq!(other.to_string(), "orders/create");
    }
}
