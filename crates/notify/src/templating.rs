//! Minijinja template rendering for notification fields.
//!
//! The API key, incident type, title and message are all templates rendered
//! against [`TemplateData`], which is built once per notification from the
//! alert batch and its grouping context.

use chrono::{DateTime, Utc};
use statuspal_core::{
    aggregate_status_as_of, common_annotations, common_labels, Alert, AlertStatus, LabelSet,
};

use crate::secret::Secret;
use crate::traits::{NotifyContext, NotifyError};

/// Data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateData {
    pub receiver: String,
    /// Aggregate status of the batch.
    pub status: AlertStatus,
    pub alerts: Vec<TemplateAlert>,
    pub group_key: String,
    pub group_labels: LabelSet,
    pub common_labels: LabelSet,
    pub common_annotations: LabelSet,
    pub external_url: String,
}

/// A single alert as seen by templates. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateAlert {
    pub status: AlertStatus,
    pub labels: LabelSet,
    pub annotations: LabelSet,
    pub starts_at: String,
    pub ends_at: Option<String>,
    pub generator_url: String,
    pub fingerprint: String,
}

impl TemplateData {
    pub fn new(ctx: &NotifyContext, alerts: &[Alert]) -> Self {
        Self::new_as_of(ctx, alerts, Utc::now())
    }

    /// Build with every status evaluated against the same `now`, so the
    /// batch status and the per-alert statuses always agree.
    pub fn new_as_of(ctx: &NotifyContext, alerts: &[Alert], now: DateTime<Utc>) -> Self {
        Self {
            receiver: ctx.receiver.clone(),
            status: aggregate_status_as_of(alerts, now),
            alerts: alerts.iter().map(|a| TemplateAlert::new(a, now)).collect(),
            group_key: ctx.group_key.clone(),
            group_labels: ctx.group_labels.clone(),
            common_labels: common_labels(alerts),
            common_annotations: common_annotations(alerts),
            external_url: ctx.external_url.clone(),
        }
    }
}

impl TemplateAlert {
    pub fn new(alert: &Alert, now: DateTime<Utc>) -> Self {
        Self {
            status: alert.status_as_of(now),
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
            starts_at: alert.starts_at.to_rfc3339(),
            ends_at: alert.ends_at.map(|t| t.to_rfc3339()),
            generator_url: alert.generator_url.clone(),
            fingerprint: alert.fingerprint.clone(),
        }
    }
}

/// Renders notification templates using minijinja.
///
/// Templates are arbitrary strings, so nothing is registered up front; the
/// environment only carries filters and globals and is shared by every
/// render call.
#[derive(Debug)]
pub struct TemplateRenderer {
    env: minijinja::Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = minijinja::Environment::new();

        // `lower` and `upper` ship with the "builtins" feature, but we
        // register explicit versions to guarantee availability.
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);
        env.add_function("env", env_function);

        Self { env }
    }

    /// Render a template string with the given data.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(&self, template_str: &str, data: &TemplateData) -> Result<String, NotifyError> {
        self.env
            .render_str(template_str, data)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Render a secret-bearing template.
    ///
    /// Errors only carry the failure kind so neither the template source nor
    /// a partial render can leak into logs.
    pub fn render_secret(&self, template: &Secret, data: &TemplateData) -> Result<Secret, NotifyError> {
        self.env
            .render_str(template.expose(), data)
            .map(Secret::from)
            .map_err(|e| NotifyError::Template(format!("api_key: {}", e.kind())))
    }

    /// Validate that a template string parses, without evaluating it.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template has syntax errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        self.env
            .template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }

    pub fn validate_secret(&self, template: &Secret) -> Result<(), NotifyError> {
        self.env
            .template_from_str(template.expose())
            .map_err(|e| NotifyError::Config(format!("invalid api_key template: {}", e.kind())))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Global function: read an environment variable by name.
///
/// Missing variables render as an empty string (with a warning).
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_alerts() -> Vec<Alert> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        vec![
            Alert::new(start)
                .with_label("alertname", "HighLatency")
                .with_label("instance", "a:9100")
                .with_annotation("summary", "p99 above 2s"),
            Alert::new(start)
                .with_label("alertname", "HighLatency")
                .with_label("instance", "b:9100")
                .with_annotation("summary", "p99 above 2s")
                .resolved_at(start),
        ]
    }

    fn sample_data() -> TemplateData {
        let ctx = NotifyContext::new("{}:{alertname=\"HighLatency\"}")
            .with_receiver("statuspal")
            .with_external_url("http://alertmanager:9093");
        TemplateData::new(&ctx, &sample_alerts())
    }

    #[test]
    fn data_summarises_batch() {
        let data = sample_data();
        assert_eq!(data.status, AlertStatus::Firing);
        assert_eq!(data.alerts.len(), 2);
        assert_eq!(data.alerts[1].status, AlertStatus::Resolved);
        assert_eq!(data.common_labels.len(), 1);
        assert_eq!(data.common_annotations["summary"], "p99 above 2s");
    }

    #[test]
    fn batch_and_alert_status_share_one_clock() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let end = start + Duration::minutes(5);
        let alerts = [Alert::new(start).resolved_at(end)];
        let ctx = NotifyContext::new("g");

        let at_end = TemplateData::new_as_of(&ctx, &alerts, end);
        assert_eq!(at_end.status, AlertStatus::Resolved);
        assert_eq!(at_end.alerts[0].status, AlertStatus::Resolved);

        let before_end = TemplateData::new_as_of(&ctx, &alerts, end - Duration::seconds(1));
        assert_eq!(before_end.status, AlertStatus::Firing);
        assert_eq!(before_end.alerts[0].status, AlertStatus::Firing);
    }

    #[test]
    fn render_basic_template() {
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("{{ common_labels.alertname }} via {{ receiver }}", &sample_data())
            .unwrap();
        assert_eq!(result, "HighLatency via statuspal");
    }

    #[test]
    fn render_alert_iteration() {
        let renderer = TemplateRenderer::new();
        let template = "{% for a in alerts %}{{ a.labels.instance }}={{ a.status }} {% endfor %}";
        let result = renderer.render(template, &sample_data()).unwrap();
        assert_eq!(result, "a:9100=firing b:9100=resolved ");
    }

    #[test]
    fn render_upper_lower_filters() {
        let renderer = TemplateRenderer::new();
        let data = sample_data();
        assert_eq!(renderer.render("{{ status | upper }}", &data).unwrap(), "FIRING");
        assert_eq!(
            renderer
                .render("{{ common_labels.alertname | lower }}", &data)
                .unwrap(),
            "highlatency"
        );
    }

    #[test]
    fn render_missing_label_is_empty() {
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("[{{ common_labels.severity }}]", &sample_data())
            .unwrap();
        assert_eq!(result, "[]");
    }

    #[test]
    fn render_env_function() {
        std::env::set_var("STATUSPAL_NOTIFY_TEST_VAR", "hello_notify");

        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("Env: {{ env('STATUSPAL_NOTIFY_TEST_VAR') }}", &sample_data())
            .unwrap();
        assert_eq!(result, "Env: hello_notify");

        std::env::remove_var("STATUSPAL_NOTIFY_TEST_VAR");
    }

    #[test]
    fn render_env_missing_returns_empty() {
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("Env: [{{ env('DEFINITELY_NOT_SET_XYZ') }}]", &sample_data())
            .unwrap();
        assert_eq!(result, "Env: []");
    }

    #[test]
    fn invalid_template_produces_error() {
        let renderer = TemplateRenderer::new();
        match renderer.render("{{ unclosed", &sample_data()) {
            Err(NotifyError::Template(msg)) => assert!(!msg.is_empty()),
            other => panic!("Expected Template error, got: {:?}", other),
        }
    }

    #[test]
    fn render_secret_keeps_value_opaque() {
        let renderer = TemplateRenderer::new();
        let key = renderer
            .render_secret(&Secret::new("key-{{ receiver }}"), &sample_data())
            .unwrap();
        assert_eq!(key.expose(), "key-statuspal");
        assert!(!format!("{key:?}").contains("statuspal"));
    }

    #[test]
    fn render_secret_error_omits_source() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render_secret(&Secret::new("s3cr3t {{ unclosed"), &sample_data())
            .unwrap_err();
        assert!(!err.to_string().contains("s3cr3t"));
    }

    #[test]
    fn validate_templates() {
        let renderer = TemplateRenderer::new();
        assert!(renderer.validate("Hello {{ receiver }}").is_ok());
        assert!(renderer.validate("{{ unclosed").is_err());
        assert!(renderer.validate_secret(&Secret::new("{% if %}")).is_err());
    }
}
