//! # Mailbridge
//!
//! One message model, many email service providers. Plug and play.
//!
//! ## Quick Start
//!
//! Set environment variables:
//! ```bash
//! EMAIL_PROVIDER=mailtrap
//! MAILTRAP_API_TOKEN=xxxxx
//! EMAIL_FROM=noreply@example.com
//! EMAIL_FROM_NAME=My App
//! ```
//!
//! Send messages from anywhere:
//! ```rust,ignore
//! use mailbridge::{Message, send};
//!
//! let message = Message::new()
//!     .to("user@example.com")
//!     .subject("Welcome!")
//!     .text_body("Hello");
//!
//! let response = send(&message).await?;
//! for result in &response.results {
//!     println!("{} -> {}", result.recipient, result.status);
//! }
//! ```
//!
//! ## Per-Call Adapter Override
//!
//! ```rust,ignore
//! use mailbridge::{send_with, ProviderConfig};
//! use mailbridge::providers::MailtrapAdapter;
//!
//! let sandbox = MailtrapAdapter::new(
//!     ProviderConfig::new("token").testing(true).test_inbox_id("111111"),
//! )?;
//! send_with(&message, &sandbox).await?;
//! ```
//!
//! ## Webhooks
//!
//! Hand the raw request to the configured adapter from your HTTP route:
//!
//! ```rust,ignore
//! let events = mailbridge::normalize_webhook(&headers, &body)?;
//! for event in events {
//!     println!("{} {:?}", event.event_type, event.recipient);
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `EMAIL_PROVIDER` | `mailtrap`, `logger`, `logger_full` |
//! | `EMAIL_FROM` | Default sender email |
//! | `EMAIL_FROM_NAME` | Default sender name |
//! | `MAILTRAP_API_TOKEN` | Mailtrap API token (`MAILTRAP_API_KEY` also accepted) |
//! | `MAILTRAP_API_URL` | Base URL override, used verbatim |
//! | `MAILTRAP_BULK` | Use the bulk stream |
//! | `MAILTRAP_TESTING` | Send to a sandbox inbox |
//! | `MAILTRAP_TEST_INBOX_ID` | Sandbox inbox ID (required with testing) |
//! | `MAILTRAP_TIMEOUT_SECS` | Request timeout |
//! | `MAILTRAP_POLICY` | `strict` (default) or `best_effort` |
//! | `MAILTRAP_WEBHOOK_SECRET` | Comma-separated `user:password` basic auth credentials |
//! | `MAILTRAP_WEBHOOK_SIGNING_KEY` | HMAC key for `Mailtrap-Signature` |
//!
//! ## Feature Flags
//!
//! - `mailtrap` - Mailtrap API provider (default)
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//! - `full` - Everything
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit Prometheus-style metrics:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `mailbridge_send_total` | Counter | provider, status | Send calls |
//! | `mailbridge_send_duration_seconds` | Histogram | provider | Send duration |
//! | `mailbridge_recipients_total` | Counter | provider, status | Per-recipient outcomes |
//! | `mailbridge_webhook_events_total` | Counter | provider, event | Normalized webhook events |
//! | `mailbridge_webhook_rejected_total` | Counter | provider | Webhooks failing verification |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the mailbridge crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod adapter;
mod address;
mod attachment;
mod capabilities;
mod config;
mod error;
mod event;
mod message;
mod status;

pub mod endpoint;
pub mod providers;
pub mod registry;
pub mod webhook;

use http::HeaderMap;
use parking_lot::RwLock;
use std::env;
use std::sync::Arc;
use tracing::Instrument;

#[cfg(feature = "metrics")]
use std::time::Instant;

// Re-exports
pub use adapter::{Adapter, WireRequest};
pub use address::{Address, ToAddress};
pub use attachment::{Attachment, AttachmentType};
pub use capabilities::{Capabilities, CapabilityPolicy, Feature, FeatureGate};
pub use config::ProviderConfig;
pub use endpoint::{Endpoint, EndpointMode};
pub use error::MailError;
pub use event::{EventType, RejectReason, TrackingEvent};
pub use message::Message;
pub use status::{Diagnostic, SendResponse, SendResult, SendStatus};

// ============================================================================
// Global Adapter Configuration
// ============================================================================

/// Global adapter - swappable for testing
static ADAPTER: RwLock<Option<Arc<dyn Adapter>>> = RwLock::new(None);

/// Get the default from address from environment.
pub fn default_from() -> Option<Address> {
    let email = env::var("EMAIL_FROM").ok()?;
    match env::var("EMAIL_FROM_NAME").ok() {
        Some(name) => Some(Address::with_name(name, email)),
        None => Some(Address::new(email)),
    }
}

/// Get or initialize the global adapter.
fn get_adapter() -> Result<Arc<dyn Adapter>, MailError> {
    // Fast path: already configured
    if let Some(ref adapter) = *ADAPTER.read() {
        return Ok(Arc::clone(adapter));
    }

    // Slow path: need to configure
    let adapter = registry::from_env()?;
    let mut guard = ADAPTER.write();

    // Another caller may have won the race
    let adapter = guard.get_or_insert(adapter);
    Ok(Arc::clone(adapter))
}

/// Check if a provider is selected and its feature is enabled.
///
/// Supports auto-detection: if `EMAIL_PROVIDER` is not set, checks for
/// available credentials and enabled features. Credentials themselves are
/// validated by [`init`].
pub fn is_configured() -> bool {
    if ADAPTER.read().is_some() {
        return true;
    }
    let Some(provider) = registry::provider_from_env() else {
        return false;
    };
    match registry::capabilities(&provider) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "Email provider unavailable");
            false
        }
    }
}

/// Initialize the global adapter from environment variables.
///
/// Call this at startup so configuration errors (missing token, sandbox
/// without an inbox, unknown provider) surface before the first send.
///
/// ```rust,ignore
/// // In main.rs
/// mailbridge::init()?;
/// ```
pub fn init() -> Result<(), MailError> {
    if !is_configured() {
        return Err(MailError::NotConfigured);
    }
    get_adapter().map(|_| ())
}

/// Prepare message by adding default from address if needed.
fn prepare_message(message: &Message) -> Message {
    let mut message = message.clone();
    if message.from.is_none() {
        message.from = default_from();
    }
    message
}

/// Send a message using the global adapter.
///
/// Auto-configures from environment variables on first call. Adds the
/// default `from` address from `EMAIL_FROM` if not set on the message and
/// validates it before anything is serialized.
///
/// ```rust,ignore
/// use mailbridge::{Message, send};
///
/// let message = Message::new()
///     .to("user@example.com")
///     .subject("Hello!")
///     .text_body("Hi there");
///
/// send(&message).await?;
/// ```
pub async fn send(message: &Message) -> Result<SendResponse, MailError> {
    let message = prepare_message(message);
    message.validate()?;
    let adapter = get_adapter()?;
    send_prepared(&message, adapter.as_ref()).await
}

/// Send a message using a specific adapter (per-call override).
pub async fn send_with<A: Adapter + ?Sized>(
    message: &Message,
    adapter: &A,
) -> Result<SendResponse, MailError> {
    let message = prepare_message(message);
    message.validate()?;
    send_prepared(&message, adapter).await
}

/// Send several messages concurrently using the global adapter.
///
/// Returns one result per message, in input order.
pub async fn send_many(messages: &[Message]) -> Result<Vec<Result<SendResponse, MailError>>, MailError> {
    let shared = get_adapter()?;
    let adapter: &dyn Adapter = shared.as_ref();
    let provider = adapter.provider_name();
    let messages: Vec<Message> = messages.iter().map(prepare_message).collect();

    let span = tracing::info_span!("mailbridge.send_many", provider = provider, count = messages.len());
    let results = futures::future::join_all(messages.iter().map(|m| async move {
        if let Err(e) = m.validate() {
            return Err(e);
        }
        send_prepared(m, adapter).await
    }))
    .instrument(span)
    .await;

    Ok(results)
}

async fn send_prepared<A: Adapter + ?Sized>(
    message: &Message,
    adapter: &A,
) -> Result<SendResponse, MailError> {
    let provider = adapter.provider_name();
    let recipients = message.recipient_emails();

    // Emit telemetry span
    let span = tracing::info_span!(
        "mailbridge.send",
        provider = provider,
        recipients = ?recipients,
        subject = %message.subject,
    );

    async move {
        tracing::debug!("Sending message");

        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let result = adapter.send(message).await;

        #[cfg(feature = "metrics")]
        record_send(provider, &result, start.elapsed().as_secs_f64());

        match &result {
            Ok(response) => tracing::info!(
                sent = response.count(SendStatus::Sent),
                queued = response.count(SendStatus::Queued),
                rejected = response.count(SendStatus::Rejected),
                failed = response.count(SendStatus::Failed),
                unknown = response.count(SendStatus::Unknown),
                diagnostics = response.diagnostics.len(),
                "Message sent"
            ),
            Err(e) => tracing::error!(error = %e, "Message send failed"),
        }

        result
    }
    .instrument(span)
    .await
}

#[cfg(feature = "metrics")]
fn record_send(provider: &'static str, result: &Result<SendResponse, MailError>, duration: f64) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!("mailbridge_send_total", "provider" => provider, "status" => status)
        .increment(1);
    metrics::histogram!("mailbridge_send_duration_seconds", "provider" => provider)
        .record(duration);
    if let Ok(response) = result {
        for r in &response.results {
            metrics::counter!(
                "mailbridge_recipients_total",
                "provider" => provider,
                "status" => r.status.as_str()
            )
            .increment(1);
        }
    }
}

/// Normalize an inbound webhook request with the global adapter.
pub fn normalize_webhook(headers: &HeaderMap, body: &[u8]) -> Result<Vec<TrackingEvent>, MailError> {
    let adapter = get_adapter()?;
    normalize_webhook_with(adapter.as_ref(), headers, body)
}

/// Normalize an inbound webhook request with a specific adapter.
///
/// Verification failures are logged and returned without parsing the body.
pub fn normalize_webhook_with<A: Adapter + ?Sized>(
    adapter: &A,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Vec<TrackingEvent>, MailError> {
    let provider = adapter.provider_name();
    let _span = tracing::info_span!("mailbridge.webhook", provider = provider).entered();

    let result = adapter.normalize_webhook(headers, body);

    #[cfg(feature = "metrics")]
    match &result {
        Ok(events) => {
            for event in events {
                metrics::counter!(
                    "mailbridge_webhook_events_total",
                    "provider" => provider,
                    "event" => event.event_type.as_str()
                )
                .increment(1);
            }
        }
        Err(MailError::Authentication(_)) => {
            metrics::counter!("mailbridge_webhook_rejected_total", "provider" => provider)
                .increment(1);
        }
        Err(_) => {}
    }

    if let Ok(ref events) = result {
        tracing::debug!(count = events.len(), "Webhook normalized");
    }
    result
}

// ============================================================================
// Manual Configuration (for testing or custom setups)
// ============================================================================

/// Manually configure the global adapter.
///
/// Later calls replace the previous adapter.
///
/// ```rust,ignore
/// use mailbridge::{configure, providers::LoggerAdapter};
///
/// configure(LoggerAdapter::new());
/// ```
pub fn configure<A: Adapter + 'static>(adapter: A) {
    *ADAPTER.write() = Some(Arc::new(adapter));
}

/// Configure with an Arc'd adapter.
pub fn configure_arc(adapter: Arc<dyn Adapter>) {
    *ADAPTER.write() = Some(adapter);
}

/// Reset the global adapter (useful for tests).
///
/// After calling this, the next `send()` will re-initialize from env vars.
pub fn reset() {
    *ADAPTER.write() = None;
}

/// Get the configured adapter (if initialized).
pub fn adapter() -> Option<Arc<dyn Adapter>> {
    ADAPTER.read().as_ref().cloned()
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Adapter;
    pub use crate::Address;
    pub use crate::Attachment;
    pub use crate::CapabilityPolicy;
    pub use crate::MailError;
    pub use crate::Message;
    pub use crate::ProviderConfig;
    pub use crate::ToAddress;
    pub use crate::{EventType, TrackingEvent};
    pub use crate::{SendResponse, SendResult, SendStatus};
    pub use crate::{default_from, is_configured, send, send_many, send_with};
}
