//! Statuspal notifier configuration.
//!
//! Loaded from YAML. Templates are validated up front so a broken config
//! fails at startup rather than on the first alert.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::secret::Secret;
use crate::templating::TemplateRenderer;
use crate::traits::NotifyError;

pub const DEFAULT_API_URL: &str = "https://statuspal.io/api/v2/";

pub const DEFAULT_TITLE: &str = "[{{ status | upper }}] {{ common_labels.alertname }}";

pub const DEFAULT_MESSAGE: &str = "{% for alert in alerts %}\
[{{ alert.status }}] {{ alert.labels.alertname }}\
{% if alert.annotations.summary %}: {{ alert.annotations.summary }}{% endif %}\n\
{% endfor %}";

/// A Statuspal service identifier. The API uses numeric ids, but string ids
/// are passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceId {
    Numeric(u64),
    Text(String),
}

/// Static configuration for one Statuspal integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatuspalConfig {
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    /// API key, rendered as a template on every notification.
    #[serde(default)]
    pub api_key: Option<Secret>,
    /// Alternative to `api_key`: read the key template from a file.
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    pub statuspage_domain: String,
    #[serde(default)]
    pub service_ids: Vec<ServiceId>,
    #[serde(default = "default_incident_type")]
    pub incident_type: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default)]
    pub notify_email: bool,
    #[serde(default)]
    pub notify_slack: bool,
    #[serde(default)]
    pub notify_tweet: bool,
    /// Non-5xx status codes that should also be retried.
    #[serde(default)]
    pub retry_codes: Vec<u16>,
    #[serde(default)]
    pub http_config: HttpClientConfig,
}

/// Generic HTTP client settings, turned into a client by
/// [`crate::transport::build_client`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Whole-request timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub proxy_url: Option<Secret>,
    /// Extra PEM root certificate to trust.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default API URL is valid")
}

fn default_incident_type() -> String {
    "major".to_string()
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

impl StatuspalConfig {
    /// Minimal config with defaults for everything but the key and domain.
    pub fn new(api_key: impl Into<Secret>, statuspage_domain: impl Into<String>) -> Self {
        Self {
            api_url: default_api_url(),
            api_key: Some(api_key.into()),
            api_key_file: None,
            statuspage_domain: statuspage_domain.into(),
            service_ids: Vec::new(),
            incident_type: default_incident_type(),
            title: default_title(),
            message: default_message(),
            notify_email: false,
            notify_slack: false,
            notify_tweet: false,
            retry_codes: Vec::new(),
            http_config: HttpClientConfig::default(),
        }
    }

    pub fn from_yaml_str(data: &str) -> Result<Self, NotifyError> {
        serde_yaml::from_str(data)
            .map_err(|e| NotifyError::Config(format!("invalid statuspal config: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NotifyError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            NotifyError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&data)
    }

    /// The API key template, from `api_key` or `api_key_file`.
    pub fn resolve_api_key(&self) -> Result<Secret, NotifyError> {
        match (&self.api_key, &self.api_key_file) {
            (Some(_), Some(_)) => Err(NotifyError::Config(
                "at most one of api_key and api_key_file may be set".to_string(),
            )),
            (Some(key), None) => Ok(key.clone()),
            (None, Some(path)) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    NotifyError::Config(format!(
                        "failed to read api_key_file {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(Secret::new(content.trim_end_matches(['\r', '\n'])))
            }
            (None, None) => Err(NotifyError::Config(
                "one of api_key or api_key_file is required".to_string(),
            )),
        }
    }

    /// Check everything that can be checked without sending a request.
    pub fn validate(&self, renderer: &TemplateRenderer) -> Result<(), NotifyError> {
        if self.statuspage_domain.trim().is_empty() {
            return Err(NotifyError::Config(
                "statuspage_domain must not be empty".to_string(),
            ));
        }

        if !matches!(self.api_url.scheme(), "http" | "https") {
            return Err(NotifyError::Config(format!(
                "api_url must use http or https, got {}",
                self.api_url.scheme()
            )));
        }
        if self.api_url.cannot_be_a_base() {
            return Err(NotifyError::Config(
                "api_url cannot be used as a base URL".to_string(),
            ));
        }

        for (field, template) in [
            ("incident_type", &self.incident_type),
            ("title", &self.title),
            ("message", &self.message),
        ] {
            renderer
                .validate(template)
                .map_err(|e| NotifyError::Config(format!("invalid {field} template: {e}")))?;
        }

        let api_key = self.resolve_api_key()?;
        if api_key.is_empty() {
            return Err(NotifyError::Config("api_key must not be empty".to_string()));
        }
        renderer.validate_secret(&api_key)?;

        Ok(())
    }
}
