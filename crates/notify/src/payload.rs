//! Statuspal incident payload construction.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::Serialize;
use statuspal_core::{Alert, AlertStatus};

use crate::config::{ServiceId, StatuspalConfig};
use crate::templating::{TemplateData, TemplateRenderer};
use crate::traits::{NotifyContext, NotifyError};

/// Byte ceiling Statuspal accepts for incident titles and descriptions.
pub const MAX_TEXT_BYTES: usize = 20480;

const ELLIPSIS: &str = "…";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum ActivityType {
    Trigger,
    Resolve,
}

impl ActivityType {
    pub fn id(self) -> u8 {
        match self {
            ActivityType::Trigger => 1,
            ActivityType::Resolve => 4,
        }
    }

    /// Anything short of a fully resolved batch triggers.
    pub fn for_status(status: AlertStatus) -> Self {
        match status {
            AlertStatus::Resolved => ActivityType::Resolve,
            AlertStatus::Firing => ActivityType::Trigger,
        }
    }
}

impl From<ActivityType> for u8 {
    fn from(activity: ActivityType) -> Self {
        activity.id()
    }
}

/// Body of `POST status_page/{domain}/incidents`.
#[derive(Debug, Clone, Serialize)]
pub struct StatuspalPayload {
    pub title: String,
    pub service_ids: Vec<ServiceId>,
    #[serde(rename = "type")]
    pub incident_type: String,
    pub starts_at: DateTime<Utc>,
    pub incident_activities: Vec<IncidentActivity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentActivity {
    pub activity_type_id: ActivityType,
    pub description: String,
    pub email_notify: bool,
    pub slack_notify: bool,
    pub tweet: bool,
}

impl StatuspalPayload {
    pub fn encode(&self) -> Result<Vec<u8>, NotifyError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn activity(&self) -> Option<&IncidentActivity> {
        self.incident_activities.first()
    }
}

/// Renders an alert batch into a [`StatuspalPayload`].
pub struct PayloadBuilder<'a> {
    config: &'a StatuspalConfig,
    renderer: &'a TemplateRenderer,
}

impl<'a> PayloadBuilder<'a> {
    pub fn new(config: &'a StatuspalConfig, renderer: &'a TemplateRenderer) -> Self {
        Self { config, renderer }
    }

    pub fn build(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<StatuspalPayload, NotifyError> {
        self.build_from(&TemplateData::new(ctx, alerts), alerts)
    }

    /// Build from already prepared template data. The first template that
    /// fails to render aborts the build.
    pub fn build_from(&self, data: &TemplateData, alerts: &[Alert]) -> Result<StatuspalPayload, NotifyError> {
        let incident_type = self.renderer.render(&self.config.incident_type, data)?;
        let title = self.renderer.render(&self.config.title, data)?;
        let message = self.renderer.render(&self.config.message, data)?;

        let (title, truncated) = truncate(&title, MAX_TEXT_BYTES);
        if truncated {
            tracing::debug!(
                truncated_title = %title,
                incident = %data.group_key,
                "truncated incident title"
            );
        }

        let (description, truncated) = truncate(&message, MAX_TEXT_BYTES);
        if truncated {
            tracing::debug!(
                truncated_description = %description,
                incident = %data.group_key,
                "truncated incident description"
            );
        }

        Ok(StatuspalPayload {
            title: title.into_owned(),
            service_ids: self.config.service_ids.clone(),
            incident_type,
            starts_at: starts_at(alerts),
            incident_activities: vec![IncidentActivity {
                activity_type_id: ActivityType::for_status(data.status),
                description: description.into_owned(),
                email_notify: self.config.notify_email,
                slack_notify: self.config.notify_slack,
                tweet: self.config.notify_tweet,
            }],
        })
    }
}

/// Start of the first alert, or now when the batch is empty.
pub fn starts_at(alerts: &[Alert]) -> DateTime<Utc> {
    alerts.first().map(|a| a.starts_at).unwrap_or_else(Utc::now)
}

/// Truncate `s` to at most `max` bytes, marking the cut with an ellipsis.
///
/// The cut always lands on a char boundary, so multi-byte input may come out
/// a few bytes short of `max`. Returns whether anything was removed.
pub fn truncate(s: &str, max: usize) -> (Cow<'_, str>, bool) {
    if s.len() <= max {
        return (Cow::Borrowed(s), false);
    }
    if max < ELLIPSIS.len() {
        return (Cow::Borrowed(&s[..floor_char_boundary(s, max)]), true);
    }
    let cut = floor_char_boundary(s, max - ELLIPSIS.len());
    (Cow::Owned(format!("{}{ELLIPSIS}", &s[..cut])), true)
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
