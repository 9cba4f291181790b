//! Provider configuration.
//!
//! Built either with builder methods or from `<PROVIDER>_*` environment
//! variables:
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `<P>_API_TOKEN` | API credential (`<P>_API_KEY` is accepted too) |
//! | `<P>_API_URL` | Base URL override, used verbatim |
//! | `<P>_BULK` | Use the bulk stream |
//! | `<P>_TESTING` | Use the sandbox (requires `<P>_TEST_INBOX_ID`) |
//! | `<P>_TEST_INBOX_ID` | Sandbox inbox identifier |
//! | `<P>_TIMEOUT_SECS` | Outbound request timeout |
//! | `<P>_POLICY` | `strict` (default) or `best_effort` |
//! | `<P>_WEBHOOK_SECRET` | Comma-separated `user:password` basic-auth credentials |
//! | `<P>_WEBHOOK_SIGNING_KEY` | HMAC-SHA256 webhook signing key |

use std::env;
use std::fmt;
use std::time::Duration;

use crate::capabilities::CapabilityPolicy;
use crate::error::MailError;

/// Settings for one provider adapter.
#[derive(Clone, Default)]
pub struct ProviderConfig {
    api_token: Option<String>,
    /// Base URL override
    pub api_url: Option<String>,
    /// Request the bulk stream
    pub bulk: bool,
    /// Request sandbox testing
    pub testing: bool,
    /// Sandbox inbox (required when `testing`)
    pub test_inbox_id: Option<String>,
    /// Outbound request timeout, enforced by the HTTP client
    pub timeout: Option<Duration>,
    /// Default capability policy for sends that don't pass one explicitly
    pub policy: CapabilityPolicy,
    /// Accepted `user:password` pairs for webhook basic auth
    pub webhook_secrets: Vec<String>,
    /// Key for HMAC-SHA256 webhook signatures
    pub webhook_signing_key: Option<String>,
}

impl ProviderConfig {
    /// Create a configuration with the given API credential.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: Some(api_token.into()),
            ..Self::default()
        }
    }

    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    /// Replace the API credential.
    pub fn token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    /// Override the base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn bulk(mut self, bulk: bool) -> Self {
        self.bulk = bulk;
        self
    }

    pub fn testing(mut self, testing: bool) -> Self {
        self.testing = testing;
        self
    }

    pub fn test_inbox_id(mut self, inbox_id: impl Into<String>) -> Self {
        self.test_inbox_id = Some(inbox_id.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn policy(mut self, policy: CapabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Accept webhook requests carrying this `user:password` basic-auth pair.
    ///
    /// Can be called multiple times to allow credential rotation.
    pub fn webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secrets.push(secret.into());
        self
    }

    pub fn webhook_signing_key(mut self, key: impl Into<String>) -> Self {
        self.webhook_signing_key = Some(key.into());
        self
    }

    /// Load configuration for `provider` from environment variables.
    pub fn from_env(provider: &str) -> Result<Self, MailError> {
        Self::from_lookup(provider, |key| env::var(key).ok())
    }

    /// Load configuration using an arbitrary key lookup.
    ///
    /// Keys are `<PROVIDER>_<SETTING>`, e.g. `MAILTRAP_API_TOKEN`.
    pub fn from_lookup<F>(provider: &str, lookup: F) -> Result<Self, MailError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = provider.to_uppercase();
        let get = |name: &str| {
            lookup(&format!("{}_{}", prefix, name)).filter(|v| !v.trim().is_empty())
        };

        let mut config = Self {
            api_token: get("API_TOKEN").or_else(|| get("API_KEY")),
            api_url: get("API_URL"),
            test_inbox_id: get("TEST_INBOX_ID"),
            webhook_signing_key: get("WEBHOOK_SIGNING_KEY"),
            ..Self::default()
        };

        if let Some(value) = get("BULK") {
            config.bulk = parse_bool(&format!("{}_BULK", prefix), &value)?;
        }
        if let Some(value) = get("TESTING") {
            config.testing = parse_bool(&format!("{}_TESTING", prefix), &value)?;
        }
        if let Some(value) = get("TIMEOUT_SECS") {
            let secs: f64 = value.trim().parse().map_err(|_| {
                MailError::Configuration(format!(
                    "{}_TIMEOUT_SECS must be a number of seconds, got '{}'",
                    prefix, value
                ))
            })?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(MailError::Configuration(format!(
                    "{}_TIMEOUT_SECS must be positive",
                    prefix
                )));
            }
            config.timeout = Some(Duration::from_secs_f64(secs));
        }
        if let Some(value) = get("POLICY") {
            config.policy = value.parse()?;
        }
        if let Some(value) = get("WEBHOOK_SECRET") {
            config.webhook_secrets = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, MailError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(MailError::Configuration(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("bulk", &self.bulk)
            .field("testing", &self.testing)
            .field("test_inbox_id", &self.test_inbox_id)
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .field("webhook_secrets", &self.webhook_secrets.len())
            .field(
                "webhook_signing_key",
                &self.webhook_signing_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
