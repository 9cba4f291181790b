//! Mailtrap API provider.
//!
//! For reference: [Mailtrap API docs](https://api-docs.mailtrap.io/docs/mailtrap-api-docs/67f1d70aeb62c-send-email)
//!
//! # Example
//!
//! ```rust,ignore
//! use mailbridge::ProviderConfig;
//! use mailbridge::providers::MailtrapAdapter;
//!
//! let adapter = MailtrapAdapter::new(ProviderConfig::new("your-api-token"))?;
//! ```
//!
//! ## Modes
//!
//! The mode is chosen by configuration, never by code:
//!
//! ```rust,ignore
//! // Bulk stream (https://bulk.api.mailtrap.io)
//! let bulk = MailtrapAdapter::new(ProviderConfig::new("token").bulk(true))?;
//!
//! // Sandbox: messages land in a test inbox
//! let sandbox = MailtrapAdapter::new(
//!     ProviderConfig::new("token").testing(true).test_inbox_id("111111"),
//! )?;
//! ```
//!
//! ## Field mapping
//!
//! * `tags` - first tag becomes `category` (one tag only)
//! * `metadata` - `custom_variables`, values sent as strings
//! * `template_id` - `template_uuid`
//! * `merge_global_data` - `template_variables`
//! * `esp_extra` - deep-merged into the payload
//!
//! Per-recipient `merge_data`/`merge_metadata`, `send_at` and
//! `envelope_sender` have no Mailtrap equivalent. Open/click tracking is
//! configured on the Mailtrap sending domain, so per-message flags are a
//! capability gap like the others.
//!
//! ## Webhooks
//!
//! Mailtrap posts `{"events": [...]}`. Requests are authenticated with HTTP
//! basic auth (`webhook_secret("user:password")`) and/or a hex HMAC-SHA256
//! `Mailtrap-Signature` header (`webhook_signing_key(...)`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::adapter::{Adapter, WireRequest};
use crate::address::Address;
use crate::capabilities::{Capabilities, CapabilityPolicy, Feature, FeatureGate};
use crate::config::ProviderConfig;
use crate::endpoint::{self, DefaultHosts, Endpoint, EndpointMode};
use crate::error::MailError;
use crate::event::{EventType, RejectReason, TrackingEvent};
use crate::message::Message;
use crate::status::{SendResponse, SendResult, SendStatus};
use crate::webhook::{self, WebhookVerifier};

const PROVIDER: &str = "mailtrap";

const MAILTRAP_HOSTS: DefaultHosts = DefaultHosts {
    transactional: "https://send.api.mailtrap.io/api",
    bulk: Some("https://bulk.api.mailtrap.io/api"),
    sandbox: Some("https://sandbox.api.mailtrap.io/api"),
};

const SIGNATURE_HEADER: &str = "Mailtrap-Signature";

/// What Mailtrap's send API can carry.
pub static MAILTRAP_CAPABILITIES: Capabilities = Capabilities {
    supports_templates: true,
    supports_merge_global_data: true,
    supports_merge_data: false,
    supports_merge_metadata_in_batch: false,
    supports_metadata: true,
    supports_multiple_tags: false,
    supports_scheduled_send: false,
    supports_envelope_sender: false,
    supports_tracking_overrides: false,
    reserved_headers: &[
        "From",
        "To",
        "Cc",
        "Bcc",
        "Subject",
        "Content-Type",
        "Content-Transfer-Encoding",
        "MIME-Version",
    ],
    endpoint_modes: &[
        EndpointMode::Transactional,
        EndpointMode::Bulk,
        EndpointMode::Sandbox,
    ],
};

/// Mailtrap API adapter.
pub struct MailtrapAdapter {
    api_token: String,
    endpoint: Endpoint,
    policy: CapabilityPolicy,
    verifier: WebhookVerifier,
    timeout: Option<Duration>,
    client: Client,
}

impl MailtrapAdapter {
    /// Build an adapter, resolving the endpoint immediately.
    ///
    /// Fails with `Configuration` when the token is missing or sandbox
    /// testing is enabled without a test inbox.
    pub fn new(config: ProviderConfig) -> Result<Self, MailError> {
        let client = Client::builder()
            .build()
            .map_err(|e| MailError::Configuration(format!("HTTP client: {}", e)))?;
        Self::with_client(config, client)
    }

    /// Build with a caller-provided reqwest client (shared connection pool).
    ///
    /// The configured timeout is applied per request.
    pub fn with_client(config: ProviderConfig, client: Client) -> Result<Self, MailError> {
        let endpoint =
            endpoint::resolve(PROVIDER, &config, &MAILTRAP_CAPABILITIES, &MAILTRAP_HOSTS)?;
        let api_token = config.api_token().unwrap_or_default().to_string();
        let verifier = WebhookVerifier::from_config(&config, SIGNATURE_HEADER);

        tracing::debug!(
            base_url = %endpoint.base_url,
            mode = ?endpoint.mode,
            sandbox = endpoint.is_sandbox(),
            "Configured Mailtrap adapter"
        );

        Ok(Self {
            api_token,
            endpoint,
            policy: config.policy,
            verifier,
            timeout: config.timeout,
            client,
        })
    }

    /// Full URL of the send endpoint.
    pub fn send_url(&self) -> String {
        match self.endpoint.sandbox_inbox_id {
            Some(ref inbox_id) => self
                .endpoint
                .url(&format!("send/{}", urlencoding::encode(inbox_id))),
            None => self.endpoint.url("send"),
        }
    }

    fn build_request(
        &self,
        message: &Message,
        gate: &mut FeatureGate,
    ) -> Result<MailtrapRequest, MailError> {
        let caps = &MAILTRAP_CAPABILITIES;
        let from = message.from.as_ref().ok_or(MailError::MissingField("from"))?;

        if !message.merge_data.is_empty() {
            gate.allow(caps, Feature::MergeData)?;
        }
        if !message.merge_metadata.is_empty() {
            gate.allow(caps, Feature::MergeMetadata)?;
        }
        if message.send_at.is_some() {
            gate.allow(caps, Feature::ScheduledSend)?;
        }
        if message.envelope_sender.is_some() {
            gate.allow(caps, Feature::EnvelopeSender)?;
        }
        if message.tags.len() > 1 {
            gate.allow(caps, Feature::MultipleTags)?;
        }
        // Tracking is configured on the sending domain, not per message.
        if message.track_opens.is_some() || message.track_clicks.is_some() {
            gate.allow(caps, Feature::TrackingOverrides)?;
        }
        let send_template =
            message.template_id.is_some() && gate.allow(caps, Feature::Templates)?;
        let template_id = if send_template {
            message.template_id.clone()
        } else {
            None
        };
        let send_global_data = !message.merge_global_data.is_empty()
            && gate.allow(caps, Feature::MergeGlobalData)?;
        let send_metadata = !message.metadata.is_empty() && gate.allow(caps, Feature::Metadata)?;

        // Sorted so diagnostics and payloads are deterministic.
        let mut headers = BTreeMap::new();
        let mut names: Vec<&String> = message.headers.keys().collect();
        names.sort();
        for name in names {
            if caps.is_reserved_header(name) {
                gate.unsupported(Feature::ReservedHeader(name.clone()))?;
                continue;
            }
            headers.insert(name.clone(), message.headers[name].clone());
        }
        if !message.reply_to.is_empty() && message.get_header("Reply-To").is_none() {
            let reply_to = message
                .reply_to
                .iter()
                .map(Address::formatted_rfc5322)
                .collect::<Vec<_>>()
                .join(", ");
            headers.insert("Reply-To".to_string(), reply_to);
        }

        let custom_variables: Map<String, Value> = if send_metadata {
            message
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(stringify(v))))
                .collect()
        } else {
            Map::new()
        };

        let subject = if template_id.is_some() && message.subject.is_empty() {
            None
        } else {
            Some(message.subject.clone())
        };

        Ok(MailtrapRequest {
            from: MailtrapAddress::from(from),
            to: address_list(&message.to),
            cc: address_list(&message.cc),
            bcc: address_list(&message.bcc),
            subject,
            text: message.text_body.clone(),
            html: message.html_body.clone(),
            attachments: if message.attachments.is_empty() {
                None
            } else {
                Some(
                    message
                        .attachments
                        .iter()
                        .map(|a| MailtrapAttachment {
                            filename: a.filename.clone(),
                            content_type: a.content_type.clone(),
                            content: a.base64_data(),
                            disposition: if a.is_inline() { "inline" } else { "attachment" },
                            content_id: if a.is_inline() { a.content_id.clone() } else { None },
                        })
                        .collect(),
                )
            },
            headers: if headers.is_empty() { None } else { Some(headers) },
            category: message.tags.first().cloned(),
            custom_variables: if custom_variables.is_empty() {
                None
            } else {
                Some(custom_variables)
            },
            template_uuid: template_id,
            template_variables: if !send_global_data {
                None
            } else {
                Some(
                    message
                        .merge_global_data
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                )
            },
        })
    }
}

#[async_trait]
impl Adapter for MailtrapAdapter {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn capabilities(&self) -> &'static Capabilities {
        &MAILTRAP_CAPABILITIES
    }

    fn endpoint(&self) -> Option<&Endpoint> {
        Some(&self.endpoint)
    }

    fn default_policy(&self) -> CapabilityPolicy {
        self.policy
    }

    fn serialize(
        &self,
        message: &Message,
        policy: CapabilityPolicy,
    ) -> Result<WireRequest, MailError> {
        let mut gate = FeatureGate::new(PROVIDER, policy);
        let request = self.build_request(message, &mut gate)?;

        let mut body = serde_json::to_value(&request)?;
        if !message.esp_extra.is_empty() {
            merge_deep(&mut body, Value::Object(message.esp_extra.clone()));
        }

        Ok(WireRequest {
            body,
            recipients: message.recipient_emails(),
            diagnostics: gate.into_diagnostics(),
        })
    }

    fn normalize_response(
        &self,
        request: &WireRequest,
        status: u16,
        body: &[u8],
    ) -> Result<Vec<SendResult>, MailError> {
        normalize_response(&request.recipients, status, body)
    }

    fn normalize_webhook(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Vec<TrackingEvent>, MailError> {
        if let Err(err) = self.verifier.verify(headers, body) {
            tracing::warn!(provider = PROVIDER, error = %err, "Rejected webhook request");
            return Err(err);
        }
        let events = webhook::split_batch(body, "events")?
            .into_iter()
            .map(to_tracking_event)
            .collect::<Vec<_>>();
        tracing::debug!(provider = PROVIDER, count = events.len(), "Normalized webhook events");
        Ok(events)
    }

    async fn send_with_policy(
        &self,
        message: &Message,
        policy: CapabilityPolicy,
    ) -> Result<SendResponse, MailError> {
        message.validate()?;
        let request = self.serialize(message, policy)?;
        let url = self.send_url();

        tracing::debug!(url = %url, recipients = request.recipients.len(), "Sending Mailtrap request");

        let mut builder = self.client.post(&url);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("User-Agent", format!("mailbridge/{}", crate::VERSION))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&request.body)
            .send()
            .await
            .map_err(|e| MailError::from_transport(PROVIDER, e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| MailError::from_transport(PROVIDER, e))?;

        let results = self.normalize_response(&request, status, &body)?;
        Ok(SendResponse::new(PROVIDER, results).with_diagnostics(request.diagnostics))
    }
}

// ============================================================================
// Response normalization
// ============================================================================

/// Map a Mailtrap reply onto the recipients, in order.
fn normalize_response(
    recipients: &[String],
    status: u16,
    body: &[u8],
) -> Result<Vec<SendResult>, MailError> {
    let parsed: Value = serde_json::from_slice(body).map_err(|e| {
        MailError::unavailable(
            PROVIDER,
            format!("HTTP {} with non-JSON body: {}", status, e),
        )
    })?;
    let raw = String::from_utf8_lossy(body).into_owned();
    let success_status = (200..300).contains(&status);

    // Per-recipient replies, one entry per recipient.
    if let Some(entries) = parsed.get("responses").and_then(Value::as_array) {
        if entries.len() == recipients.len() && !recipients.is_empty() {
            return Ok(recipients
                .iter()
                .zip(entries)
                .map(|(recipient, entry)| entry_result(recipient, entry, status))
                .collect());
        }
    }

    let success = parsed.get("success").and_then(Value::as_bool);
    let errors = error_detail(&parsed);

    if success_status && success != Some(false) && errors.is_none() {
        if let Some(ids) = message_ids(&parsed) {
            return Ok(assign_ids(recipients, &ids));
        }
    }

    if errors.is_some() || success == Some(false) || !success_status {
        let detail = errors.unwrap_or(raw);
        return Ok(broadcast(recipients, failure_status(status), Some(detail)));
    }

    Ok(broadcast(recipients, SendStatus::Unknown, Some(raw)))
}

fn entry_result(recipient: &str, entry: &Value, status: u16) -> SendResult {
    let success = entry.get("success").and_then(Value::as_bool);
    let errors = error_detail(entry);
    match (success, errors) {
        (Some(true), None) => {
            let result = SendResult::new(recipient, SendStatus::Sent);
            match message_ids(entry).and_then(|ids| ids.into_iter().next()) {
                Some(id) => result.message_id(id),
                None => result,
            }
        }
        (Some(false), detail) | (None, detail @ Some(_)) => {
            let status = if (200..300).contains(&status) {
                SendStatus::Rejected
            } else {
                failure_status(status)
            };
            SendResult::new(recipient, status).detail(detail.unwrap_or_else(|| entry.to_string()))
        }
        _ => SendResult::new(recipient, SendStatus::Unknown).detail(entry.to_string()),
    }
}

fn failure_status(http_status: u16) -> SendStatus {
    match http_status {
        200..=299 | 400 | 422 => SendStatus::Rejected,
        _ => SendStatus::Failed,
    }
}

fn message_ids(value: &Value) -> Option<Vec<String>> {
    value.get("message_ids").and_then(Value::as_array).map(|ids| {
        ids.iter()
            .filter_map(|id| id.as_str().map(str::to_string))
            .collect()
    })
}

fn assign_ids(recipients: &[String], ids: &[String]) -> Vec<SendResult> {
    if recipients.is_empty() {
        return vec![SendResult::new("", SendStatus::Sent)];
    }
    recipients
        .iter()
        .enumerate()
        .map(|(i, recipient)| {
            let id = if ids.len() == 1 { ids.first() } else { ids.get(i) };
            let result = SendResult::new(recipient.as_str(), SendStatus::Sent);
            match id {
                Some(id) => result.message_id(id.as_str()),
                None => result,
            }
        })
        .collect()
}

fn broadcast(recipients: &[String], status: SendStatus, detail: Option<String>) -> Vec<SendResult> {
    let make = |recipient: &str| {
        let result = SendResult::new(recipient, status);
        match detail {
            Some(ref d) => result.detail(d.as_str()),
            None => result,
        }
    };
    if recipients.is_empty() {
        return vec![make("")];
    }
    recipients.iter().map(|r| make(r.as_str())).collect()
}

/// Flatten Mailtrap's `errors` / `error` fields into one string.
fn error_detail(value: &Value) -> Option<String> {
    let flatten = |v: &Value| -> String {
        match v {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(stringify)
                .collect::<Vec<_>>()
                .join("; "),
            Value::Object(fields) => fields
                .iter()
                .map(|(k, v)| format!("{}: {}", k, stringify(v)))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    };

    match (value.get("errors"), value.get("error")) {
        (Some(errors), _) if !is_empty_value(errors) => Some(flatten(errors)),
        (_, Some(error)) if !is_empty_value(error) => Some(flatten(error)),
        _ => None,
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Merge `extra` into `target`: objects recursively, everything else replaced.
fn merge_deep(target: &mut Value, extra: Value) {
    match (target, extra) {
        (Value::Object(target), Value::Object(extra)) => {
            for (key, value) in extra {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_deep(existing, value)
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, extra) => *target = extra,
    }
}

// ============================================================================
// Webhook normalization
// ============================================================================

fn event_type(kind: &str) -> EventType {
    match kind {
        "delivery" => EventType::Delivered,
        "open" => EventType::Opened,
        "click" => EventType::Clicked,
        "bounce" => EventType::Bounced,
        "soft bounce" | "suspension" => EventType::Deferred,
        "blocked" | "reject" => EventType::Rejected,
        "spam" => EventType::Complained,
        "unsubscribe" => EventType::Unsubscribed,
        _ => EventType::Unknown,
    }
}

fn reject_reason(kind: &str) -> Option<RejectReason> {
    match kind {
        "bounce" => Some(RejectReason::Bounced),
        "blocked" | "reject" => Some(RejectReason::Blocked),
        "spam" => Some(RejectReason::Spam),
        "unsubscribe" => Some(RejectReason::Unsubscribed),
        "soft bounce" | "suspension" => Some(RejectReason::Other),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                DateTime::from_timestamp(secs, 0)
            } else {
                let secs = n.as_f64()?;
                let whole = secs.trunc();
                let nanos = ((secs - whole) * 1e9).round() as u32;
                DateTime::from_timestamp(whole as i64, nanos)
            }
        }
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(secs) => DateTime::from_timestamp(secs, 0),
            Err(_) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        },
        _ => None,
    }
}

fn to_tracking_event(raw: Value) -> TrackingEvent {
    let str_field = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
    let kind = str_field("event").unwrap_or_default();

    let mut event = TrackingEvent::new(event_type(&kind), Value::Null);
    event.reject_reason = reject_reason(&kind);
    event.timestamp = raw.get("timestamp").and_then(parse_timestamp);
    event.message_id = str_field("message_id");
    event.event_id = str_field("event_id");
    event.recipient = str_field("email");
    event.mta_response = str_field("response").or_else(|| {
        raw.get("response_code")
            .filter(|v| !v.is_null())
            .map(stringify)
    });
    event.tags = str_field("category").into_iter().collect();
    event.metadata = raw
        .get("custom_variables")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    event.click_url = str_field("url");
    event.user_agent = str_field("user_agent");
    event.raw = raw;
    event
}

// ============================================================================
// Mailtrap API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct MailtrapRequest {
    from: MailtrapAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<Vec<MailtrapAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<Vec<MailtrapAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bcc: Option<Vec<MailtrapAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<MailtrapAttachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_variables: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_variables: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct MailtrapAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<&Address> for MailtrapAddress {
    fn from(addr: &Address) -> Self {
        Self {
            email: addr.email.clone(),
            name: addr.name.clone(),
        }
    }
}

fn address_list(addrs: &[Address]) -> Option<Vec<MailtrapAddress>> {
    if addrs.is_empty() {
        None
    } else {
        Some(addrs.iter().map(MailtrapAddress::from).collect())
    }
}

#[derive(Debug, Serialize)]
struct MailtrapAttachment {
    filename: String,
    #[serde(rename = "type")]
    content_type: String,
    content: String, // Base64 encoded
    disposition: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_id: Option<String>,
}
