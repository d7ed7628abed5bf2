//! Delivers alert batches to the Statuspal incidents API.
//!
//! One call to [`Notifier::notify`] renders the payload, sends exactly one
//! POST, drains the response and classifies the status. Retrying is left to
//! the caller, driven by [`DispatchOutcome::retryable`].

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use statuspal_core::Alert;
use url::Url;

use crate::config::StatuspalConfig;
use crate::payload::{PayloadBuilder, StatuspalPayload};
use crate::redact;
use crate::retry::{Retrier, RetryPolicy};
use crate::secret::Secret;
use crate::templating::{TemplateData, TemplateRenderer};
use crate::traits::{DispatchOutcome, Notifier, NotifyContext, NotifyError};
use crate::transport;

/// Upper bound on response bytes read (and discarded) before the connection
/// is released.
const MAX_DRAIN_BYTES: usize = 64 * 1024;

/// Statuspal notifier. Immutable after construction, so one instance can
/// serve any number of concurrent calls.
#[derive(Debug)]
pub struct Dispatcher {
    config: StatuspalConfig,
    /// API key template, resolved from `api_key` or `api_key_file`.
    api_key: Secret,
    renderer: TemplateRenderer,
    client: reqwest::Client,
    retrier: Box<dyn RetryPolicy>,
}

/// Everything needed to send, built before any I/O happens.
struct PreparedRequest {
    url: Url,
    api_key: Secret,
    body: Vec<u8>,
}

impl Dispatcher {
    /// Validate `config` and build a client from its `http_config`.
    pub fn new(config: StatuspalConfig) -> Result<Self, NotifyError> {
        let client = transport::build_client(&config.http_config)?;
        Self::with_client(config, client)
    }

    /// Like [`Dispatcher::new`] but with a caller-supplied client.
    pub fn with_client(config: StatuspalConfig, client: reqwest::Client) -> Result<Self, NotifyError> {
        let renderer = TemplateRenderer::new();
        config.validate(&renderer)?;
        let api_key = config.resolve_api_key()?;
        let retrier = Box::new(Retrier::with_retry_codes(config.retry_codes.iter().copied()));

        Ok(Self {
            config,
            api_key,
            renderer,
            client,
            retrier,
        })
    }

    /// Replace the status classification policy.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retrier = Box::new(policy);
        self
    }

    /// `{api_url}/status_page/{domain}/incidents`.
    pub fn incidents_url(&self) -> Result<Url, NotifyError> {
        let mut url = self.config.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| NotifyError::Config("api_url cannot be used as a base URL".to_string()))?
            .pop_if_empty()
            .extend(["status_page", self.config.statuspage_domain.as_str(), "incidents"]);
        Ok(url)
    }

    /// Render the payload without sending it.
    pub fn render_payload(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<StatuspalPayload, NotifyError> {
        PayloadBuilder::new(&self.config, &self.renderer).build(ctx, alerts)
    }

    fn prepare(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<PreparedRequest, NotifyError> {
        let data = TemplateData::new(ctx, alerts);
        let api_key = self.renderer.render_secret(&self.api_key, &data)?;
        let url = self.incidents_url()?;
        let payload = PayloadBuilder::new(&self.config, &self.renderer).build_from(&data, alerts)?;
        let body = payload.encode()?;
        Ok(PreparedRequest { url, api_key, body })
    }

    async fn send(&self, ctx: &NotifyContext, request: PreparedRequest) -> DispatchOutcome {
        let PreparedRequest { url, api_key, body } = request;
        let safe_url = redact::redact_url(&url);

        let mut auth = match HeaderValue::from_str(api_key.expose()) {
            Ok(value) => value,
            Err(_) => {
                return DispatchOutcome::retry(NotifyError::Config(
                    "rendered api_key is not a valid header value".to_string(),
                ))
            }
        };
        auth.set_sensitive(true);

        let request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, auth)
            .body(body);

        tracing::debug!(url = %safe_url, group_key = %ctx.group_key, "sending statuspal incident");

        let response = match ctx.run(request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = redact::transport_error(e, &url, &[api_key.expose()]);
                tracing::warn!(
                    group_key = %ctx.group_key,
                    error = %err,
                    "statuspal request failed"
                );
                return DispatchOutcome::retry(err);
            }
            Err(e) => {
                tracing::debug!(group_key = %ctx.group_key, error = %e, "statuspal request aborted");
                return DispatchOutcome::fail(e);
            }
        };

        let status = response.status().as_u16();
        if let Err(e) = ctx.run(drain(response)).await {
            tracing::debug!(group_key = %ctx.group_key, error = %e, "aborted while draining response");
            return DispatchOutcome::fail(e);
        }

        let outcome = DispatchOutcome::from(self.retrier.classify(status));
        match &outcome.error {
            None => tracing::info!(
                url = %safe_url,
                group_key = %ctx.group_key,
                status,
                "statuspal notification delivered"
            ),
            Some(e) => tracing::warn!(
                url = %safe_url,
                group_key = %ctx.group_key,
                status,
                retryable = outcome.retryable,
                error = %e,
                "statuspal rejected notification"
            ),
        }
        outcome
    }
}

#[async_trait::async_trait]
impl Notifier for Dispatcher {
    async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> DispatchOutcome {
        if ctx.is_cancelled() {
            return DispatchOutcome::fail(NotifyError::Cancelled);
        }

        let request = match self.prepare(ctx, alerts) {
            Ok(request) => request,
            Err(e) => {
                if ctx.is_cancelled() {
                    return DispatchOutcome::fail(NotifyError::Cancelled);
                }
                tracing::warn!(
                    group_key = %ctx.group_key,
                    error = %e,
                    "failed to render statuspal notification"
                );
                return DispatchOutcome::retry(e);
            }
        };

        self.send(ctx, request).await
    }

    fn integration_name(&self) -> &str {
        "statuspal"
    }
}

/// Read and discard up to [`MAX_DRAIN_BYTES`] so the connection can return
/// to the pool. Read errors only mean the connection won't be reused.
async fn drain(mut response: reqwest::Response) {
    let mut read = 0;
    while read < MAX_DRAIN_BYTES {
        match response.chunk().await {
            Ok(Some(chunk)) => read += chunk.len(),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e.without_url(), "failed to drain response body");
                break;
            }
        }
    }
}
