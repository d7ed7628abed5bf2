use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label or annotation set. Ordered so rendered output is stable.
pub type LabelSet = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single firing or resolved condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub annotations: LabelSet,
    pub starts_at: DateTime<Utc>,
    /// Set once the alert has stopped firing (or is scheduled to).
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl Alert {
    pub fn new(starts_at: DateTime<Utc>) -> Self {
        Self {
            labels: LabelSet::new(),
            annotations: LabelSet::new(),
            starts_at,
            ends_at: None,
            generator_url: String::new(),
            fingerprint: String::new(),
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(name.into(), value.into());
        self
    }

    pub fn resolved_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    /// `alertname` label, if present.
    pub fn name(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }

    /// Whether the alert is resolved as of `now`.
    pub fn resolved_as_of(&self, now: DateTime<Utc>) -> bool {
        matches!(self.ends_at, Some(ends_at) if ends_at <= now)
    }

    pub fn status_as_of(&self, now: DateTime<Utc>) -> AlertStatus {
        if self.resolved_as_of(now) {
            AlertStatus::Resolved
        } else {
            AlertStatus::Firing
        }
    }

    pub fn status(&self) -> AlertStatus {
        self.status_as_of(Utc::now())
    }
}

/// Reduce a batch to a single status.
///
/// `Resolved` only when the batch is non-empty and every alert is resolved.
/// An empty batch counts as `Firing` so callers never emit a resolve they
/// cannot justify.
pub fn aggregate_status(alerts: &[Alert]) -> AlertStatus {
    aggregate_status_as_of(alerts, Utc::now())
}

pub fn aggregate_status_as_of(alerts: &[Alert], now: DateTime<Utc>) -> AlertStatus {
    if !alerts.is_empty() && alerts.iter().all(|a| a.resolved_as_of(now)) {
        AlertStatus::Resolved
    } else {
        AlertStatus::Firing
    }
}

/// Label pairs shared by every alert in the batch.
pub fn common_labels(alerts: &[Alert]) -> LabelSet {
    intersect(alerts.iter().map(|a| &a.labels))
}

/// Annotation pairs shared by every alert in the batch.
pub fn common_annotations(alerts: &[Alert]) -> LabelSet {
    intersect(alerts.iter().map(|a| &a.annotations))
}

fn intersect<'a>(mut sets: impl Iterator<Item = &'a LabelSet>) -> LabelSet {
    let Some(first) = sets.next() else {
        return LabelSet::new();
    };
    let mut common = first.clone();
    for set in sets {
        common.retain(|k, v| set.get(k) == Some(v));
    }
    common
}
