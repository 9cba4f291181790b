//! Static provider lookup.
//!
//! Adapters are chosen by name once, at configuration time. Unknown names and
//! providers whose cargo feature is disabled fail with
//! [`MailError::Configuration`] instead of surfacing on the first send.

use std::env;
use std::sync::Arc;

use crate::adapter::Adapter;
use crate::capabilities::Capabilities;
use crate::config::ProviderConfig;
use crate::error::MailError;
use crate::providers;

/// Every provider name this crate knows, whether or not its feature is enabled.
pub const PROVIDERS: &[&str] = &["mailtrap", "logger", "logger_full"];

/// Build the adapter registered under `name` (case-insensitive).
///
/// ```rust,ignore
/// use mailbridge::{registry, ProviderConfig};
///
/// let adapter = registry::resolve("mailtrap", &ProviderConfig::new("token"))?;
/// assert_eq!(adapter.provider_name(), "mailtrap");
/// ```
pub fn resolve(name: &str, config: &ProviderConfig) -> Result<Arc<dyn Adapter>, MailError> {
    let name = name.trim().to_lowercase();
    match name.as_str() {
        #[cfg(feature = "mailtrap")]
        "mailtrap" => Ok(Arc::new(providers::MailtrapAdapter::new(config.clone())?)),
        #[cfg(not(feature = "mailtrap"))]
        "mailtrap" => {
            let _ = config;
            Err(feature_disabled("mailtrap"))
        }

        "logger" => Ok(Arc::new(providers::LoggerAdapter::new())),
        "logger_full" => Ok(Arc::new(providers::LoggerAdapter::full())),

        _ => Err(unknown_provider(&name)),
    }
}

/// Build the adapter registered under `name`, reading its configuration from
/// `<NAME>_*` environment variables.
pub fn resolve_from_env(name: &str) -> Result<Arc<dyn Adapter>, MailError> {
    let name = name.trim().to_lowercase();
    match name.as_str() {
        "logger" | "logger_full" => resolve(&name, &ProviderConfig::default()),
        _ if PROVIDERS.contains(&name.as_str()) => {
            resolve(&name, &ProviderConfig::from_env(&name)?)
        }
        _ => Err(unknown_provider(&name)),
    }
}

/// Capability descriptor for a provider, without building an adapter.
pub fn capabilities(name: &str) -> Result<&'static Capabilities, MailError> {
    match name.trim().to_lowercase().as_str() {
        #[cfg(feature = "mailtrap")]
        "mailtrap" => Ok(&providers::MAILTRAP_CAPABILITIES),
        #[cfg(not(feature = "mailtrap"))]
        "mailtrap" => Err(feature_disabled("mailtrap")),

        "logger" | "logger_full" => Ok(&providers::LOGGER_CAPABILITIES),

        other => Err(unknown_provider(other)),
    }
}

/// Provider named by `EMAIL_PROVIDER`, or auto-detected from credentials.
pub fn provider_from_env() -> Option<String> {
    match env::var("EMAIL_PROVIDER") {
        Ok(p) if !p.trim().is_empty() => Some(p.trim().to_lowercase()),
        _ => detect_provider().map(str::to_string),
    }
}

/// Build the adapter selected by the environment.
pub fn from_env() -> Result<Arc<dyn Adapter>, MailError> {
    let provider = provider_from_env().ok_or_else(|| {
        MailError::Configuration(
            "EMAIL_PROVIDER not set and could not auto-detect. \
            Set EMAIL_PROVIDER or ensure an API token is configured."
                .into(),
        )
    })?;
    tracing::debug!(provider = %provider, "Resolving email provider from environment");
    resolve_from_env(&provider)
}

/// Auto-detect provider based on enabled features and available credentials.
fn detect_provider() -> Option<&'static str> {
    #[cfg(feature = "mailtrap")]
    if env::var("MAILTRAP_API_TOKEN").is_ok() || env::var("MAILTRAP_API_KEY").is_ok() {
        return Some("mailtrap");
    }
    None
}

#[cfg(not(feature = "mailtrap"))]
fn feature_disabled(name: &str) -> MailError {
    MailError::Configuration(format!(
        "provider '{}' requires the '{}' feature. Add `features = [\"{}\"]` to Cargo.toml",
        name, name, name
    ))
}

fn unknown_provider(name: &str) -> MailError {
    MailError::Configuration(format!(
        "Unknown email provider: '{}'. Valid providers are: {}",
        name,
        PROVIDERS.join(", ")
    ))
}
