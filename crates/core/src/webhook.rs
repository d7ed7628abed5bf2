//! Alertmanager webhook message format.
//!
//! Used to replay grouped alert batches captured from an Alertmanager
//! webhook receiver.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{Alert, AlertStatus, LabelSet};
use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    #[serde(default)]
    pub version: String,
    pub group_key: String,
    pub status: AlertStatus,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub group_labels: LabelSet,
    #[serde(default)]
    pub common_labels: LabelSet,
    #[serde(default)]
    pub common_annotations: LabelSet,
    #[serde(rename = "externalURL", default)]
    pub external_url: String,
    #[serde(default)]
    pub alerts: Vec<WebhookAlert>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAlert {
    pub status: AlertStatus,
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub annotations: LabelSet,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", default)]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl WebhookMessage {
    pub fn from_json(data: &str) -> Result<Self, CoreError> {
        serde_json::from_str(data).map_err(|e| CoreError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, CoreError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Convert the message alerts into the in-memory alert model, in order.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.iter().map(WebhookAlert::to_alert).collect()
    }
}

impl WebhookAlert {
    /// The explicit `status` field wins over `endsAt`: Alertmanager sends a
    /// future `endsAt` on firing alerts, which would otherwise flip to resolved
    /// when a message is replayed later.
    pub fn to_alert(&self) -> Alert {
        let ends_at = match self.status {
            AlertStatus::Firing => None,
            AlertStatus::Resolved => Some(
                self.ends_at
                    .filter(|t| !is_zero_time(t))
                    .unwrap_or(self.starts_at),
            ),
        };

        Alert {
            labels: self.labels.clone(),
            annotations: self.annotations.clone(),
            starts_at: self.starts_at,
            ends_at,
            generator_url: self.generator_url.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

/// Go's zero `time.Time` serializes as `0001-01-01T00:00:00Z`.
fn is_zero_time(t: &DateTime<Utc>) -> bool {
    t.year() <= 1
}
