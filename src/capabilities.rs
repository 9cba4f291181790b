//! Per-provider capability descriptors and the strict/best-effort policy.
//!
//! Each provider declares a `'static` [`Capabilities`] value. Serializers
//! consult it read-only; when a message uses something the provider cannot
//! carry, the [`CapabilityPolicy`] passed into the send decides whether that
//! is an [`UnsupportedFeature`](crate::MailError::UnsupportedFeature) error or
//! an omitted field with a [`Diagnostic`] attached to the result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::endpoint::EndpointMode;
use crate::error::MailError;
use crate::status::Diagnostic;

/// A message feature a provider may not support.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Provider-stored template reference (`template_id`).
    Templates,
    /// Template variables shared by every recipient.
    MergeGlobalData,
    /// Message-level metadata echoed back in webhooks.
    Metadata,
    /// Per-recipient template variables.
    MergeData,
    /// Per-recipient opaque metadata echoed back in webhooks.
    MergeMetadata,
    /// More than one tag on a single message.
    MultipleTags,
    /// Deferred delivery (`send_at`).
    ScheduledSend,
    /// Explicit envelope sender / return path.
    EnvelopeSender,
    /// Per-message open/click tracking overrides.
    TrackingOverrides,
    /// A header name the provider manages itself.
    ReservedHeader(String),
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Templates => f.write_str("template_id"),
            Feature::MergeGlobalData => f.write_str("merge_global_data"),
            Feature::Metadata => f.write_str("metadata"),
            Feature::MergeData => f.write_str("merge_data"),
            Feature::MergeMetadata => f.write_str("merge_metadata"),
            Feature::MultipleTags => f.write_str("multiple tags"),
            Feature::ScheduledSend => f.write_str("send_at"),
            Feature::EnvelopeSender => f.write_str("envelope_sender"),
            Feature::TrackingOverrides => f.write_str("track_opens/track_clicks"),
            Feature::ReservedHeader(name) => write!(f, "reserved header '{}'", name),
        }
    }
}

/// How a serializer reacts to a capability gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityPolicy {
    /// Fail the send with `UnsupportedFeature`.
    #[default]
    Strict,
    /// Omit the field and attach a warning diagnostic.
    BestEffort,
}

impl FromStr for CapabilityPolicy {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "strict" => Ok(Self::Strict),
            "best_effort" | "besteffort" => Ok(Self::BestEffort),
            other => Err(MailError::Configuration(format!(
                "Unknown capability policy '{}'. Use 'strict' or 'best_effort'",
                other
            ))),
        }
    }
}

/// Static declaration of what a provider can carry in a send request.
///
/// Never mutated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_templates: bool,
    pub supports_merge_global_data: bool,
    pub supports_merge_data: bool,
    pub supports_merge_metadata_in_batch: bool,
    pub supports_metadata: bool,
    pub supports_multiple_tags: bool,
    pub supports_scheduled_send: bool,
    pub supports_envelope_sender: bool,
    /// Whether per-message open/click tracking flags are transmitted.
    pub supports_tracking_overrides: bool,
    /// Header names (case-insensitive) the provider refuses to accept.
    pub reserved_headers: &'static [&'static str],
    /// Operating modes the provider exposes.
    pub endpoint_modes: &'static [EndpointMode],
}

impl Capabilities {
    /// Whether `feature` can be transmitted.
    pub fn supports(&self, feature: &Feature) -> bool {
        match feature {
            Feature::Templates => self.supports_templates,
            Feature::MergeGlobalData => self.supports_merge_global_data,
            Feature::Metadata => self.supports_metadata,
            Feature::MergeData => self.supports_merge_data,
            Feature::MergeMetadata => self.supports_merge_metadata_in_batch,
            Feature::MultipleTags => self.supports_multiple_tags,
            Feature::ScheduledSend => self.supports_scheduled_send,
            Feature::EnvelopeSender => self.supports_envelope_sender,
            Feature::TrackingOverrides => self.supports_tracking_overrides,
            Feature::ReservedHeader(name) => !self.is_reserved_header(name),
        }
    }

    /// Case-insensitive reserved header check.
    pub fn is_reserved_header(&self, name: &str) -> bool {
        self.reserved_headers
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
    }

    /// Whether the provider offers the given operating mode.
    pub fn offers_mode(&self, mode: EndpointMode) -> bool {
        self.endpoint_modes.contains(&mode)
    }
}

/// Applies a [`CapabilityPolicy`] while a payload is being built.
///
/// Collects the diagnostics produced under best-effort policy so they can be
/// attached to the send result.
#[derive(Debug)]
pub struct FeatureGate {
    provider: &'static str,
    policy: CapabilityPolicy,
    diagnostics: Vec<Diagnostic>,
}

impl FeatureGate {
    pub fn new(provider: &'static str, policy: CapabilityPolicy) -> Self {
        Self {
            provider,
            policy,
            diagnostics: Vec::new(),
        }
    }

    /// Report a capability gap.
    ///
    /// Returns `Ok(())` when the caller should omit the field and continue.
    pub fn unsupported(&mut self, feature: Feature) -> Result<(), MailError> {
        match self.policy {
            CapabilityPolicy::Strict => Err(MailError::unsupported(self.provider, feature)),
            CapabilityPolicy::BestEffort => {
                tracing::warn!(
                    provider = self.provider,
                    feature = %feature,
                    "Omitting unsupported feature (best-effort policy)"
                );
                let message = format!("{} does not support {}; omitted", self.provider, feature);
                self.diagnostics.push(Diagnostic::new(feature, message));
                Ok(())
            }
        }
    }

    /// Check a feature the message uses against `capabilities`.
    ///
    /// `Ok(true)` means the field can be sent, `Ok(false)` that it was
    /// omitted under best-effort policy.
    pub fn allow(
        &mut self,
        capabilities: &Capabilities,
        feature: Feature,
    ) -> Result<bool, MailError> {
        if capabilities.supports(&feature) {
            return Ok(true);
        }
        self.unsupported(feature)?;
        Ok(false)
    }

    pub fn policy(&self) -> CapabilityPolicy {
        self.policy
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
