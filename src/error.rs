//! Error types for mailbridge.

use thiserror::Error;

use crate::capabilities::Feature;

/// Errors raised by adapters, the registry, and webhook normalization.
///
/// Provider-reported rejections are not errors: they come back as
/// [`SendResult`](crate::SendResult) entries with a `rejected` or `failed`
/// status.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// No adapter has been configured.
    #[error("Email provider not configured")]
    NotConfigured,

    /// Configuration error (missing credential, missing sandbox inbox, unknown provider, ...).
    ///
    /// Raised when an adapter is constructed, never at send time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The message uses a feature the provider cannot honor under strict policy.
    #[error("Unsupported feature ({provider}): {feature}")]
    UnsupportedFeature {
        provider: &'static str,
        feature: Feature,
    },

    /// Transport failure, timeout, or an unparseable provider reply.
    ///
    /// Safe to retry; the adapter layer never retries on its own.
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        provider: &'static str,
        message: String,
        /// Set when the failure was a request timeout
        timeout: bool,
    },

    /// Inbound webhook failed verification (or no verifier is configured).
    #[error("Webhook authentication failed: {0}")]
    Authentication(String),

    /// Authenticated webhook whose body could not be parsed.
    #[error("Invalid webhook payload: {0}")]
    InvalidWebhook(String),

    /// Missing required field (e.g., from address).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Header name or value that cannot be transmitted.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Attachment file not found.
    #[error("Attachment file not found: {0}")]
    AttachmentFileNotFound(String),

    /// Failed to read attachment file.
    #[error("Failed to read attachment: {0}")]
    AttachmentReadError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl MailError {
    /// Create a transport-level error for a provider.
    pub fn unavailable(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider,
            message: message.into(),
            timeout: false,
        }
    }

    /// Create an unsupported-feature error.
    pub fn unsupported(provider: &'static str, feature: Feature) -> Self {
        Self::UnsupportedFeature { provider, feature }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }

    /// Whether this error is a timeout reported by the transport.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { timeout: true, .. })
    }
}

#[cfg(feature = "_http")]
impl MailError {
    /// Classify a reqwest failure for the given provider.
    pub(crate) fn from_transport(provider: &'static str, err: reqwest::Error) -> Self {
        Self::ProviderUnavailable {
            provider,
            timeout: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
