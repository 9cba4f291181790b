//! Inbound webhook authentication and payload helpers shared by providers.
//!
//! Verification fails closed: a request is rejected when no verifier is
//! configured, and every configured verifier must pass.

use base64::Engine;
use hmac::{Hmac, Mac};
use http::HeaderMap;
use serde_json::Value;
use sha2::Sha256;

use crate::config::ProviderConfig;
use crate::error::MailError;

type HmacSha256 = Hmac<Sha256>;

/// Checks inbound webhook requests against configured secrets.
#[derive(Clone)]
pub struct WebhookVerifier {
    basic_auth: Vec<String>,
    signing_key: Option<String>,
    signature_header: &'static str,
}

impl WebhookVerifier {
    /// Build from provider configuration. `signature_header` names the
    /// header carrying the hex HMAC-SHA256 of the raw body.
    pub fn from_config(config: &ProviderConfig, signature_header: &'static str) -> Self {
        Self {
            basic_auth: config.webhook_secrets.clone(),
            signing_key: config.webhook_signing_key.clone(),
            signature_header,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.basic_auth.is_empty() || self.signing_key.is_some()
    }

    /// Verify a request. Returns `MailError::Authentication` on any failure.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), MailError> {
        if !self.is_configured() {
            return Err(MailError::Authentication(
                "no webhook secret or signing key configured".into(),
            ));
        }
        if !self.basic_auth.is_empty() {
            verify_basic_auth(headers, &self.basic_auth)?;
        }
        if let Some(ref key) = self.signing_key {
            verify_signature(headers, self.signature_header, key, body)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("basic_auth", &self.basic_auth.len())
            .field("signing_key", &self.signing_key.is_some())
            .field("signature_header", &self.signature_header)
            .finish()
    }
}

/// Check an `Authorization: Basic ...` header against accepted `user:password` pairs.
pub fn verify_basic_auth(headers: &HeaderMap, secrets: &[String]) -> Result<(), MailError> {
    let value = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| MailError::Authentication("missing basic auth credentials".into()))?;

    let (scheme, encoded) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| MailError::Authentication("malformed Authorization header".into()))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(MailError::Authentication(format!(
            "unsupported auth scheme '{}'",
            scheme
        )));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| MailError::Authentication("malformed basic auth credentials".into()))?;

    // Compare against every secret so timing doesn't reveal which one matched.
    let matched = secrets
        .iter()
        .fold(false, |acc, secret| constant_time_eq(secret.as_bytes(), &decoded) | acc);
    if matched {
        Ok(())
    } else {
        Err(MailError::Authentication("basic auth credentials do not match".into()))
    }
}

/// Check a hex HMAC-SHA256 signature of `body`. A `sha256=` prefix is accepted.
pub fn verify_signature(
    headers: &HeaderMap,
    header_name: &str,
    key: &str,
    body: &[u8],
) -> Result<(), MailError> {
    let value = headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| MailError::Authentication(format!("missing {} header", header_name)))?;

    let hex_sig = value.trim();
    let hex_sig = hex_sig.strip_prefix("sha256=").unwrap_or(hex_sig);
    let signature = hex::decode(hex_sig)
        .map_err(|_| MailError::Authentication(format!("malformed {} header", header_name)))?;

    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|_| MailError::Authentication("invalid signing key".into()))?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| MailError::Authentication("signature mismatch".into()))
}

/// Hex HMAC-SHA256 of `body`, as a provider would compute it.
pub fn sign(key: &str, body: &[u8]) -> Result<String, MailError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|_| MailError::Configuration("invalid signing key".into()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Parse a webhook body and split it into individual event payloads.
///
/// Accepts `{"<batch_key>": [...]}`, a bare array, or a single event object.
/// An empty object carries no events.
pub fn split_batch(body: &[u8], batch_key: &str) -> Result<Vec<Value>, MailError> {
    let parsed: Value =
        serde_json::from_slice(body).map_err(|e| MailError::InvalidWebhook(e.to_string()))?;

    match parsed {
        Value::Array(events) => Ok(events),
        Value::Object(mut obj) => match obj.remove(batch_key) {
            Some(Value::Array(events)) => Ok(events),
            Some(other) => Err(MailError::InvalidWebhook(format!(
                "'{}' must be an array, got {}",
                batch_key, other
            ))),
            None if obj.is_empty() => Ok(Vec::new()),
            None => Ok(vec![Value::Object(obj)]),
        },
        other => Err(MailError::InvalidWebhook(format!(
            "expected a JSON object or array, got {}",
            other
        ))),
    }
}
