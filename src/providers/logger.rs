//! Logger adapter that only logs messages.
//!
//! Useful for staging environments or when you want to see what would be sent
//! without talking to a provider. Every recipient comes back `queued`.

use async_trait::async_trait;
use http::HeaderMap;
use serde_json::json;

use crate::adapter::{Adapter, WireRequest};
use crate::address::Address;
use crate::capabilities::{Capabilities, CapabilityPolicy};
use crate::error::MailError;
use crate::event::TrackingEvent;
use crate::message::Message;
use crate::status::{SendResponse, SendResult, SendStatus};

/// Nothing is transmitted, so nothing is unsupported.
pub static LOGGER_CAPABILITIES: Capabilities = Capabilities {
    supports_templates: true,
    supports_merge_global_data: true,
    supports_merge_data: true,
    supports_merge_metadata_in_batch: true,
    supports_metadata: true,
    supports_multiple_tags: true,
    supports_scheduled_send: true,
    supports_envelope_sender: true,
    supports_tracking_overrides: true,
    reserved_headers: &[],
    endpoint_modes: &[],
};

/// Logger adapter that emits tracing events for messages.
pub struct LoggerAdapter {
    /// If true, log full message details. If false, just log recipient summary.
    log_full: bool,
}

impl LoggerAdapter {
    /// Create a logger adapter with brief output (just recipients).
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Create a logger adapter with full message details.
    pub fn full() -> Self {
        Self { log_full: true }
    }

    /// Set whether to log full message details.
    pub fn log_full(mut self, full: bool) -> Self {
        self.log_full = full;
        self
    }
}

impl Default for LoggerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for LoggerAdapter {
    fn provider_name(&self) -> &'static str {
        "logger"
    }

    fn capabilities(&self) -> &'static Capabilities {
        &LOGGER_CAPABILITIES
    }

    fn serialize(
        &self,
        message: &Message,
        _policy: CapabilityPolicy,
    ) -> Result<WireRequest, MailError> {
        let formatted = |addrs: &[Address]| addrs.iter().map(Address::formatted).collect::<Vec<_>>();
        let body = json!({
            "from": message.from.as_ref().map(Address::formatted),
            "to": formatted(&message.to),
            "cc": formatted(&message.cc),
            "bcc": formatted(&message.bcc),
            "subject": message.subject,
            "template_id": message.template_id,
            "tags": message.tags,
            "attachments": message.attachments.len(),
        });

        Ok(WireRequest {
            body,
            recipients: message.recipient_emails(),
            diagnostics: Vec::new(),
        })
    }

    fn normalize_response(
        &self,
        request: &WireRequest,
        status: u16,
        body: &[u8],
    ) -> Result<Vec<SendResult>, MailError> {
        let (status, detail) = if (200..300).contains(&status) {
            (SendStatus::Queued, None)
        } else {
            let body = String::from_utf8_lossy(body);
            let detail = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.into_owned()
            };
            (SendStatus::Failed, Some(detail))
        };
        let make = |recipient: &str| {
            let result = SendResult::new(recipient, status);
            match detail {
                Some(ref detail) => result.detail(detail.as_str()),
                None => result,
            }
        };

        if request.recipients.is_empty() {
            return Ok(vec![make("")]);
        }
        Ok(request.recipients.iter().map(|r| make(r.as_str())).collect())
    }

    fn normalize_webhook(
        &self,
        _headers: &HeaderMap,
        _body: &[u8],
    ) -> Result<Vec<TrackingEvent>, MailError> {
        Err(MailError::Authentication(
            "logger adapter does not accept webhooks".into(),
        ))
    }

    async fn send_with_policy(
        &self,
        message: &Message,
        policy: CapabilityPolicy,
    ) -> Result<SendResponse, MailError> {
        message.validate()?;
        let request = self.serialize(message, policy)?;
        let message_id = uuid::Uuid::new_v4().to_string();

        if self.log_full {
            tracing::info!(
                message_id = %message_id,
                payload = %request.body,
                has_html = message.html_body.is_some(),
                has_text = message.text_body.is_some(),
                "Message logged (full)"
            );

            // Also log bodies at debug level
            if let Some(ref text) = message.text_body {
                tracing::debug!(body = %text, "Text body");
            }
            if let Some(ref html) = message.html_body {
                tracing::debug!(body = %html, "HTML body");
            }
        } else {
            tracing::info!(
                message_id = %message_id,
                to = ?request.recipients,
                subject = %message.subject,
                "Message logged"
            );
        }

        let results = self
            .normalize_response(&request, 200, &[])?
            .into_iter()
            .map(|result| result.message_id(message_id.as_str()))
            .collect();
        Ok(SendResponse::new(self.provider_name(), results))
    }
}
