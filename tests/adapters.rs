//! Adapter integration tests.
//!
//! Provider HTTP APIs are mocked with wiremock.

#[path = "adapters/logger_test.rs"]
mod logger_test;
#[cfg(feature = "mailtrap")]
#[path = "adapters/mailtrap_test.rs"]
mod mailtrap_test;
