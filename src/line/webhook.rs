//! Signature validation and parsing of webhook requests.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::event::CallbackRequest;

/// Header carrying the base64 HMAC-SHA256 of the body.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

type HmacSha256 = Hmac<Sha256>;

/// Reasons a webhook request is rejected before any event is handled.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Missing header or HMAC mismatch.
    #[error("invalid signature")]
    InvalidSignature,

    /// The body is not a webhook payload.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::MalformedPayload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Compute the signature the platform would send for `body`.
#[must_use]
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return String::new();
    };
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Constant-time check of `signature` against `body`.
#[must_use]
pub fn verify_signature(channel_secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Validate the signature and decode the events.
pub fn parse_request(
    channel_secret: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<CallbackRequest, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::InvalidSignature)?;

    if !verify_signature(channel_secret, signature, body) {
        return Err(WebhookError::InvalidSignature);
    }

    serde_json::from_slice(body).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
}
