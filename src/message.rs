//! Provider-independent outbound message with builder pattern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::address::{Address, ToAddress};
use crate::attachment::Attachment;
use crate::error::MailError;

/// An outbound email message.
///
/// ```
/// use mailbridge::Message;
///
/// let message = Message::new()
///     .from("sender@example.com")
///     .to("recipient@example.com")
///     .subject("Hello!")
///     .text_body("Plain text content")
///     .html_body("<h1>HTML content</h1>");
/// assert!(message.validate().is_ok());
/// ```
///
/// ## Fields
///
/// - `from`, `to`, `cc`, `bcc`, `reply_to` - Addresses
/// - `subject`, `text_body`, `html_body` - Content (optional with a template)
/// - `attachments`, `headers` - Attachments and custom headers
/// - `tags`, `metadata` - Message-level tracking data
/// - `template_id`, `merge_global_data` - Provider-side templates
/// - `merge_data`, `merge_metadata` - Per-recipient template variables and
///   per-recipient tracking data, keyed by recipient email
/// - `track_opens`, `track_clicks`, `send_at`, `envelope_sender` - Delivery options
/// - `esp_extra` - Raw fields merged into the provider payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Sender address
    pub from: Option<Address>,
    /// Primary recipients
    pub to: Vec<Address>,
    /// Carbon copy recipients
    pub cc: Vec<Address>,
    /// Blind carbon copy recipients
    pub bcc: Vec<Address>,
    /// Reply-to addresses
    pub reply_to: Vec<Address>,
    pub subject: String,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub attachments: Vec<Attachment>,
    /// Custom headers. Names are unique ignoring case.
    pub headers: HashMap<String, String>,
    pub tags: Vec<String>,
    /// Message-level metadata echoed back in webhooks
    pub metadata: HashMap<String, Value>,
    /// Provider template identifier
    pub template_id: Option<String>,
    /// Template variables shared by all recipients
    pub merge_global_data: HashMap<String, Value>,
    /// Per-recipient template variables
    pub merge_data: HashMap<String, HashMap<String, Value>>,
    /// Per-recipient metadata echoed back in webhooks
    pub merge_metadata: HashMap<String, HashMap<String, Value>>,
    pub track_opens: Option<bool>,
    pub track_clicks: Option<bool>,
    /// Deferred delivery time
    pub send_at: Option<DateTime<Utc>>,
    /// Envelope sender / return path
    pub envelope_sender: Option<String>,
    /// Provider-specific payload fields, deep-merged last
    pub esp_extra: Map<String, Value>,
}

impl Message {
    /// Create a new empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address.
    pub fn from(mut self, addr: impl ToAddress) -> Self {
        self.from = Some(addr.to_address());
        self
    }

    /// Add a recipient.
    pub fn to(mut self, addr: impl ToAddress) -> Self {
        self.to.push(addr.to_address());
        self
    }

    /// Replace all recipients.
    pub fn put_to(mut self, addrs: Vec<Address>) -> Self {
        self.to = addrs;
        self
    }

    /// Add a CC recipient.
    pub fn cc(mut self, addr: impl ToAddress) -> Self {
        self.cc.push(addr.to_address());
        self
    }

    /// Add a BCC recipient.
    pub fn bcc(mut self, addr: impl ToAddress) -> Self {
        self.bcc.push(addr.to_address());
        self
    }

    /// Add a reply-to address.
    pub fn reply_to(mut self, addr: impl ToAddress) -> Self {
        self.reply_to.push(addr.to_address());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Add a custom header, replacing any existing header with the same
    /// name (compared ignoring case).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    /// Look up a header ignoring case.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a message-level metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn template_id(mut self, id: impl Into<String>) -> Self {
        self.template_id = Some(id.into());
        self
    }

    /// Add a template variable shared by every recipient.
    pub fn merge_global(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.merge_global_data.insert(key.into(), value.into());
        self
    }

    /// Add a template variable for a single recipient.
    pub fn merge_data(
        mut self,
        recipient: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.merge_data
            .entry(recipient.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Add a metadata entry for a single recipient.
    pub fn merge_metadata(
        mut self,
        recipient: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.merge_metadata
            .entry(recipient.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    pub fn track_opens(mut self, enabled: bool) -> Self {
        self.track_opens = Some(enabled);
        self
    }

    pub fn track_clicks(mut self, enabled: bool) -> Self {
        self.track_clicks = Some(enabled);
        self
    }

    pub fn send_at(mut self, at: DateTime<Utc>) -> Self {
        self.send_at = Some(at);
        self
    }

    pub fn envelope_sender(mut self, sender: impl Into<String>) -> Self {
        self.envelope_sender = Some(sender.into());
        self
    }

    /// Set a raw provider payload field.
    ///
    /// ```rust,ignore
    /// Message::new().esp_extra("custom_option", "value")
    /// ```
    pub fn esp_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.esp_extra.insert(key.into(), value.into());
        self
    }

    /// All recipients in to, cc, bcc order.
    pub fn all_recipients(&self) -> Vec<&Address> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .collect()
    }

    /// Recipient emails in to, cc, bcc order.
    pub fn recipient_emails(&self) -> Vec<String> {
        self.all_recipients()
            .into_iter()
            .map(|a| a.email.clone())
            .collect()
    }

    pub fn has_body(&self) -> bool {
        self.text_body.is_some() || self.html_body.is_some()
    }

    /// Check the message is sendable.
    ///
    /// Requires a sender, at least one recipient, syntactically valid
    /// addresses, transmittable headers, and either a body or a template.
    pub fn validate(&self) -> Result<(), MailError> {
        let from = self.from.as_ref().ok_or(MailError::MissingField("from"))?;
        from.validate()?;

        if self.all_recipients().is_empty() {
            return Err(MailError::MissingField("to"));
        }
        for addr in self.all_recipients().into_iter().chain(self.reply_to.iter()) {
            addr.validate()?;
        }
        if let Some(ref sender) = self.envelope_sender {
            Address::new(sender.as_str()).validate()?;
        }

        if self.template_id.is_none() && !self.has_body() {
            return Err(MailError::MissingField("body"));
        }

        for (name, value) in &self.headers {
            let bad_name = name.is_empty()
                || name
                    .chars()
                    .any(|c| c == ':' || c.is_whitespace() || c.is_control());
            if bad_name {
                return Err(MailError::InvalidHeader(format!("invalid name '{}'", name)));
            }
            if value.contains('\r') || value.contains('\n') {
                return Err(MailError::InvalidHeader(format!(
                    "value of '{}' contains a line break",
                    name
                )));
            }
        }

        Ok(())
    }
}
