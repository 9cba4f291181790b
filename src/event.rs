//! Canonical delivery/engagement events produced by webhook normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Provider-independent event taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Queued,
    Delivered,
    Bounced,
    Deferred,
    Opened,
    Clicked,
    /// Recipient marked the message as spam
    Complained,
    Unsubscribed,
    Rejected,
    /// Event type this crate does not recognize
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Queued => "queued",
            EventType::Delivered => "delivered",
            EventType::Bounced => "bounced",
            EventType::Deferred => "deferred",
            EventType::Opened => "opened",
            EventType::Clicked => "clicked",
            EventType::Complained => "complained",
            EventType::Unsubscribed => "unsubscribed",
            EventType::Rejected => "rejected",
            EventType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a message was not (or will no longer be) delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Invalid,
    Bounced,
    TimedOut,
    Blocked,
    Spam,
    Unsubscribed,
    Other,
}

/// A normalized webhook event.
///
/// Created once per event in an inbound webhook and handed to the caller;
/// nothing is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub event_type: EventType,
    /// Event time in UTC, when the provider supplied one
    pub timestamp: Option<DateTime<Utc>>,
    /// Provider message ID (matches [`SendResult::message_id`](crate::SendResult::message_id))
    pub message_id: Option<String>,
    /// Provider's unique ID for this event
    pub event_id: Option<String>,
    pub recipient: Option<String>,
    pub reject_reason: Option<RejectReason>,
    /// Raw response from the receiving mail server
    pub mta_response: Option<String>,
    pub tags: Vec<String>,
    /// Metadata supplied at send time, as echoed by the provider
    pub metadata: Map<String, Value>,
    pub click_url: Option<String>,
    pub user_agent: Option<String>,
    /// The provider's original event payload
    pub raw: Value,
}

impl TrackingEvent {
    /// An event of the given type with every optional field empty.
    pub fn new(event_type: EventType, raw: Value) -> Self {
        Self {
            event_type,
            timestamp: None,
            message_id: None,
            event_id: None,
            recipient: None,
            reject_reason: None,
            mta_response: None,
            tags: Vec::new(),
            metadata: Map::new(),
            click_url: None,
            user_agent: None,
            raw,
        }
    }
}
