pub mod alert;
pub mod error;
pub mod webhook;

pub use alert::*;
pub use error::*;
pub use webhook::{WebhookAlert, WebhookMessage};
