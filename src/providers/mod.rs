//! Provider adapter implementations.
//!
//! Each provider implements the [`Adapter`](crate::Adapter) trait.
//!
//! ## Available Providers
//!
//! | Provider | Feature Flag | Description |
//! |----------|-------------|-------------|
//! | [`MailtrapAdapter`] | `mailtrap` | Mailtrap API (transactional, bulk, sandbox) |
//! | [`LoggerAdapter`] | (none) | Logs messages without sending |

#[cfg(feature = "mailtrap")]
mod mailtrap;
#[cfg(feature = "mailtrap")]
pub use mailtrap::{MailtrapAdapter, MAILTRAP_CAPABILITIES};

mod logger;
pub use logger::{LoggerAdapter, LOGGER_CAPABILITIES};
