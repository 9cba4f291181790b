//! Normalized per-recipient send results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::Feature;

/// Normalized delivery status for one recipient of one send call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    /// Accepted for later delivery.
    Queued,
    /// Accepted and handed to the provider's delivery pipeline.
    Sent,
    /// Refused by the provider (bad address, policy, invalid request).
    Rejected,
    /// The provider failed to process the request (auth, quota, server error).
    Failed,
    /// The reply could not be interpreted.
    Unknown,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendStatus::Queued => "queued",
            SendStatus::Sent => "sent",
            SendStatus::Rejected => "rejected",
            SendStatus::Failed => "failed",
            SendStatus::Unknown => "unknown",
        }
    }

    /// Whether the provider accepted the message for this recipient.
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendStatus::Queued | SendStatus::Sent)
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for a single recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    /// Recipient address (email only, no display name)
    pub recipient: String,
    pub status: SendStatus,
    /// Message ID assigned by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Raw provider error detail, kept for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SendResult {
    pub fn new(recipient: impl Into<String>, status: SendStatus) -> Self {
        Self {
            recipient: recipient.into(),
            status,
            message_id: None,
            detail: None,
        }
    }

    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A warning attached to a send performed under best-effort policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The feature that was omitted
    pub feature: Feature,
    pub message: String,
}

impl Diagnostic {
    pub fn new(feature: Feature, message: impl Into<String>) -> Self {
        Self {
            feature,
            message: message.into(),
        }
    }
}

/// Everything a send call returns: one result per recipient, in to, cc, bcc
/// order, plus any best-effort diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendResponse {
    pub provider: &'static str,
    pub results: Vec<SendResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl SendResponse {
    pub fn new(provider: &'static str, results: Vec<SendResult>) -> Self {
        Self {
            provider,
            results,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Result for a specific recipient address.
    pub fn get(&self, recipient: &str) -> Option<&SendResult> {
        self.results
            .iter()
            .find(|r| r.recipient.eq_ignore_ascii_case(recipient))
    }

    /// Statuses in recipient order.
    pub fn statuses(&self) -> Vec<SendStatus> {
        self.results.iter().map(|r| r.status).collect()
    }

    /// True when every recipient was accepted.
    pub fn all_accepted(&self) -> bool {
        self.results.iter().all(|r| r.status.is_accepted())
    }

    /// Number of recipients with the given status.
    pub fn count(&self, status: SendStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}
