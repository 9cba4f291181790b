//! The provider adapter contract.
//!
//! Every provider implements [`Adapter`]: a capability descriptor, an
//! endpoint, a request serializer, a response normalizer, and a webhook
//! normalizer. The serializer and both normalizers are pure; only
//! [`Adapter::send_with_policy`] touches the network.
//!
//! # Why `async_trait`?
//!
//! Adapters are selected at runtime by name (see [`registry`](crate::registry))
//! and stored as `Arc<dyn Adapter>`. Native async trait methods are not
//! object-safe, so the send methods are boxed through `async_trait`. The
//! allocation is noise next to a provider round trip.

use async_trait::async_trait;
use http::HeaderMap;
use serde_json::Value;

use crate::capabilities::{Capabilities, CapabilityPolicy};
use crate::endpoint::Endpoint;
use crate::error::MailError;
use crate::event::TrackingEvent;
use crate::message::Message;
use crate::status::{Diagnostic, SendResponse, SendResult};

/// A serialized provider request.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// Provider payload
    pub body: Value,
    /// Recipient emails in the order the provider reports results (to, cc, bcc)
    pub recipients: Vec<String>,
    /// Best-effort omissions made while serializing
    pub diagnostics: Vec<Diagnostic>,
}

/// Trait implemented by every provider adapter.
///
/// ```ignore
/// use mailbridge::{Adapter, Message, ProviderConfig};
/// use mailbridge::providers::MailtrapAdapter;
///
/// let adapter = MailtrapAdapter::new(ProviderConfig::new("api-token"))?;
///
/// let message = Message::new()
///     .from("sender@example.com")
///     .to("recipient@example.com")
///     .subject("Hello")
///     .text_body("World");
///
/// let response = adapter.send(&message).await?;
/// for result in &response.results {
///     println!("{}: {}", result.recipient, result.status);
/// }
/// ```
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Provider name used by the registry.
    fn provider_name(&self) -> &'static str;

    /// Static capability descriptor.
    fn capabilities(&self) -> &'static Capabilities;

    /// Resolved endpoint, for adapters that talk to a provider API.
    fn endpoint(&self) -> Option<&Endpoint> {
        None
    }

    /// Policy used by [`send`](Adapter::send).
    fn default_policy(&self) -> CapabilityPolicy {
        CapabilityPolicy::Strict
    }

    /// Translate a message into the provider's wire payload.
    fn serialize(
        &self,
        message: &Message,
        policy: CapabilityPolicy,
    ) -> Result<WireRequest, MailError>;

    /// Turn a provider reply into one result per recipient.
    ///
    /// Only fails with `ProviderUnavailable` when the body is not JSON.
    fn normalize_response(
        &self,
        request: &WireRequest,
        status: u16,
        body: &[u8],
    ) -> Result<Vec<SendResult>, MailError>;

    /// Verify and parse an inbound webhook request.
    ///
    /// Fails with `Authentication` (and yields no events) when verification
    /// fails or isn't configured.
    fn normalize_webhook(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Vec<TrackingEvent>, MailError>;

    /// Send a message with an explicit capability policy.
    async fn send_with_policy(
        &self,
        message: &Message,
        policy: CapabilityPolicy,
    ) -> Result<SendResponse, MailError>;

    /// Send a message using the adapter's configured policy.
    async fn send(&self, message: &Message) -> Result<SendResponse, MailError> {
        self.send_with_policy(message, self.default_policy()).await
    }

    /// Send several messages concurrently.
    ///
    /// Each message gets its own independent result; one failure does not
    /// affect the others.
    async fn send_many(&self, messages: &[Message]) -> Vec<Result<SendResponse, MailError>> {
        futures::future::join_all(messages.iter().map(|m| self.send(m))).await
    }
}
