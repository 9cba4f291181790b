//! Endpoint resolution: base URL and operating mode from configuration.
//!
//! Resolution is pure and deterministic. It never touches the network, and
//! every configuration problem it can detect is reported here, when the
//! adapter is built, rather than on the first send.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::Capabilities;
use crate::config::ProviderConfig;
use crate::error::MailError;

/// Provider API surface a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointMode {
    /// Low-latency single sends.
    Transactional,
    /// High-volume stream. Only used when explicitly requested.
    Bulk,
    /// Test sends captured in an inbox, never delivered.
    Sandbox,
}

impl fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointMode::Transactional => f.write_str("transactional"),
            EndpointMode::Bulk => f.write_str("bulk"),
            EndpointMode::Sandbox => f.write_str("sandbox"),
        }
    }
}

/// Provider-documented default hosts, one per mode.
#[derive(Debug, Clone, Copy)]
pub struct DefaultHosts {
    pub transactional: &'static str,
    pub bulk: Option<&'static str>,
    pub sandbox: Option<&'static str>,
}

/// A resolved endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Fully-qualified base URL (no trailing slash handling required by callers)
    pub base_url: String,
    /// Active mode, or `None` when an explicit override is in effect.
    pub mode: Option<EndpointMode>,
    /// Test inbox, present whenever sandbox testing is enabled.
    pub sandbox_inbox_id: Option<String>,
}

impl Endpoint {
    /// Join a path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Whether sends go to a test inbox.
    pub fn is_sandbox(&self) -> bool {
        self.sandbox_inbox_id.is_some()
    }
}

/// Resolve the base URL and mode for a provider.
///
/// Rules, in order:
/// 1. A credential is required.
/// 2. Sandbox testing and bulk cannot both be requested.
/// 3. The requested mode must be one the provider's `endpoint_modes` lists.
/// 4. Sandbox testing requires a test inbox identifier.
/// 5. An explicit `api_url` is used verbatim and leaves the mode unconstrained.
/// 6. Otherwise sandbox, then bulk, then transactional.
pub fn resolve(
    provider: &'static str,
    config: &ProviderConfig,
    capabilities: &Capabilities,
    hosts: &DefaultHosts,
) -> Result<Endpoint, MailError> {
    let prefix = provider.to_uppercase();

    if config.api_token().map(str::trim).unwrap_or("").is_empty() {
        return Err(MailError::Configuration(format!(
            "{}_API_TOKEN not set",
            prefix
        )));
    }

    if config.testing && config.bulk {
        return Err(MailError::Configuration(format!(
            "{}_TESTING and {}_BULK cannot both be enabled",
            prefix, prefix
        )));
    }

    let requested = if config.testing {
        EndpointMode::Sandbox
    } else if config.bulk {
        EndpointMode::Bulk
    } else {
        EndpointMode::Transactional
    };
    if !capabilities.offers_mode(requested) {
        return Err(MailError::Configuration(format!(
            "{} has no {} mode",
            provider, requested
        )));
    }

    let sandbox_inbox_id = if config.testing {
        match config.test_inbox_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(id.to_string()),
            _ => {
                return Err(MailError::Configuration(format!(
                    "{}_TEST_INBOX_ID is required when {}_TESTING is enabled",
                    prefix, prefix
                )))
            }
        }
    } else {
        None
    };

    if let Some(ref url) = config.api_url {
        if url.trim().is_empty() {
            return Err(MailError::Configuration(format!(
                "{}_API_URL is set but empty",
                prefix
            )));
        }
        return Ok(Endpoint {
            base_url: url.clone(),
            mode: None,
            sandbox_inbox_id,
        });
    }

    let host = match requested {
        EndpointMode::Transactional => Some(hosts.transactional),
        EndpointMode::Bulk => hosts.bulk,
        EndpointMode::Sandbox => hosts.sandbox,
    }
    .ok_or_else(|| {
        MailError::Configuration(format!("{} has no {} host configured", provider, requested))
    })?;

    Ok(Endpoint {
        base_url: host.to_string(),
        mode: Some(requested),
        sandbox_inbox_id,
    })
}
