//! Statuspal notification adapter.
//!
//! This crate provides:
//! - `Notifier` trait and the `Dispatcher` that delivers alert batches to the
//!   Statuspal incidents API
//! - Minijinja template rendering for the API key, title, message and type
//! - Payload construction with truncation and trigger/resolve classification
//! - Status-code retry classification and secret redaction for errors

pub mod config;
pub mod dispatcher;
pub mod payload;
pub mod redact;
pub mod retry;
pub mod secret;
pub mod templating;
pub mod traits;
pub mod transport;

pub use config::{HttpClientConfig, ServiceId, StatuspalConfig};
pub use dispatcher::Dispatcher;
pub use payload::{ActivityType, PayloadBuilder, StatuspalPayload};
pub use retry::{Retrier, RetryPolicy};
pub use secret::Secret;
pub use traits::{test_alerts, DispatchOutcome, Notifier, NotifyContext, NotifyError};
