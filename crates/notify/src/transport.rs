//! Builds the shared HTTP client from generic client settings.

use std::time::Duration;

use crate::config::HttpClientConfig;
use crate::traits::NotifyError;

const DEFAULT_USER_AGENT: &str = concat!("statuspal-notify/", env!("CARGO_PKG_VERSION"));

/// Build a pooled client. The returned client is cheap to clone and safe to
/// share across concurrent notifications.
pub fn build_client(config: &HttpClientConfig) -> Result<reqwest::Client, NotifyError> {
    let mut builder = reqwest::Client::builder().user_agent(
        config
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
    );

    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = config.connect_timeout_secs {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }

    if let Some(proxy_url) = &config.proxy_url {
        // The proxy URL may embed credentials; keep them out of the error.
        let proxy = reqwest::Proxy::all(proxy_url.expose())
            .map_err(|_| NotifyError::Config("invalid proxy_url".to_string()))?;
        builder = builder.proxy(proxy);
    }

    if let Some(path) = &config.ca_file {
        let pem = std::fs::read(path).map_err(|e| {
            NotifyError::Config(format!("failed to read ca_file {}: {e}", path.display()))
        })?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
            NotifyError::Config(format!("invalid certificate in {}: {e}", path.display()))
        })?;
        builder = builder.add_root_certificate(cert);
    }

    if config.insecure_skip_verify {
        tracing::warn!("TLS certificate verification disabled for statuspal client");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::Secret;

    #[test]
    fn builds_default_client() {
        assert!(build_client(&HttpClientConfig::default()).is_ok());
    }

    #[test]
    fn builds_with_timeouts_and_proxy() {
        let config = HttpClientConfig {
            timeout_secs: Some(5),
            connect_timeout_secs: Some(2),
            proxy_url: Some(Secret::new("http://proxy.internal:3128")),
            user_agent: Some("custom/1.0".to_string()),
            ..Default::default()
        };
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn missing_ca_file_is_config_error() {
        let config = HttpClientConfig {
            ca_file: Some("/definitely/not/here.pem".into()),
            ..Default::default()
        };
        match build_client(&config) {
            Err(NotifyError::Config(msg)) => assert!(msg.contains("ca_file")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn proxy_error_hides_credentials() {
        let config = HttpClientConfig {
            proxy_url: Some(Secret::new("::not a url:: hunter2")),
            ..Default::default()
        };
        if let Err(e) = build_client(&config) {
            assert!(!e.to_string().contains("hunter2"));
        }
    }
}
