//! Notifier trait definition and shared error/outcome types.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use statuspal_core::{Alert, LabelSet, WebhookMessage};
use tokio_util::sync::CancellationToken;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Payload encoding failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Connect, TLS or protocol failure. The text is already redacted.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Notification cancelled")]
    Cancelled,

    #[error("Notification deadline exceeded")]
    DeadlineExceeded,

    #[error("Unexpected status code {status}")]
    UnexpectedStatus { status: u16 },
}

impl NotifyError {
    /// Cancellation and deadline expiry both mean "stop trying".
    pub fn is_cancellation(&self) -> bool {
        matches!(self, NotifyError::Cancelled | NotifyError::DeadlineExceeded)
    }
}

/// Result of one notify call: whether the caller should resend, and why it failed.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub retryable: bool,
    pub error: Option<NotifyError>,
}

impl DispatchOutcome {
    pub fn delivered() -> Self {
        Self {
            retryable: false,
            error: None,
        }
    }

    pub fn retry(error: NotifyError) -> Self {
        Self {
            retryable: true,
            error: Some(error),
        }
    }

    pub fn fail(error: NotifyError) -> Self {
        Self {
            retryable: false,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<(), NotifyError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl From<(bool, Option<NotifyError>)> for DispatchOutcome {
    fn from((retryable, error): (bool, Option<NotifyError>)) -> Self {
        Self { retryable, error }
    }
}

/// Per-call grouping context: who the batch belongs to and when to give up.
#[derive(Debug, Clone)]
pub struct NotifyContext {
    /// Stable key of the alert group, used to correlate diagnostics.
    pub group_key: String,
    pub receiver: String,
    pub group_labels: LabelSet,
    pub external_url: String,
    cancel: CancellationToken,
    deadline: Option<tokio::time::Instant>,
}

impl NotifyContext {
    pub fn new(group_key: impl Into<String>) -> Self {
        Self {
            group_key: group_key.into(),
            receiver: String::new(),
            group_labels: LabelSet::new(),
            external_url: String::new(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Build a context from an Alertmanager webhook message.
    pub fn from_webhook(msg: &WebhookMessage) -> Self {
        Self::new(msg.group_key.clone())
            .with_receiver(msg.receiver.clone())
            .with_group_labels(msg.group_labels.clone())
            .with_external_url(msg.external_url.clone())
    }

    /// Context of the synthetic batch sent by connectivity tests.
    pub fn for_test() -> Self {
        Self::new(TEST_GROUP_KEY).with_receiver("test")
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = receiver.into();
        self
    }

    pub fn with_group_labels(mut self, labels: LabelSet) -> Self {
        self.group_labels = labels;
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = url.into();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: tokio::time::Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(tokio::time::Instant::now() + timeout)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<tokio::time::Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
            || self
                .deadline
                .is_some_and(|d| d <= tokio::time::Instant::now())
    }

    /// Run `fut` until it completes, the token fires, or the deadline passes.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, NotifyError> {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| NotifyError::DeadlineExceeded),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NotifyError::Cancelled),
            res = bounded => res,
        }
    }
}

const TEST_GROUP_KEY: &str = "{}:{alertname=\"StatuspalNotifyTest\"}";

/// The synthetic firing alert sent by connectivity tests.
pub fn test_alerts() -> Vec<Alert> {
    vec![Alert::new(Utc::now())
        .with_label("alertname", "StatuspalNotifyTest")
        .with_label("severity", "none")
        .with_annotation(
            "summary",
            "This is a test notification from statuspal-notify.",
        )]
}

/// Trait for notification integrations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert batch. Performs at most one outbound request and
    /// never retries internally; `DispatchOutcome::retryable` tells the
    /// caller whether resending later makes sense.
    async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> DispatchOutcome;

    /// Test connectivity with a synthetic firing alert.
    async fn test(&self) -> DispatchOutcome {
        self.notify(&NotifyContext::for_test(), &test_alerts()).await
    }

    /// Human-readable name for this integration.
    fn integration_name(&self) -> &str;
}
