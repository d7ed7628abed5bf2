//! Scrubbing of secrets from error text.
//!
//! Everything that leaves the dispatcher as an error or a log line passes
//! through here first.

use std::error::Error as _;

use url::Url;

use crate::secret::REDACTED;
use crate::traits::NotifyError;

/// The URL without userinfo, query or fragment.
pub fn redact_url(url: &Url) -> String {
    let mut clean = url.clone();
    // Only fails for cannot-be-a-base URLs, which config validation rejects.
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    clean.set_query(None);
    clean.set_fragment(None);
    clean.to_string()
}

/// Strings inside `url` that must never be shown: password and query values.
///
/// The username is left out. It is not secret, [`redact_url`] already drops
/// it, and short names like `http` or `api` would mangle unrelated text.
pub fn url_secrets(url: &Url) -> Vec<String> {
    let mut secrets = Vec::new();
    if let Some(password) = url.password() {
        secrets.push(password.to_string());
    }
    for (_, value) in url.query_pairs() {
        if !value.is_empty() {
            secrets.push(value.into_owned());
        }
    }
    secrets
}

/// Replace every occurrence of each non-empty secret in `text`.
pub fn scrub<S: AsRef<str>>(text: &str, secrets: &[S]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        let secret = secret.as_ref();
        if !secret.is_empty() {
            out = out.replace(secret, REDACTED);
        }
    }
    out
}

/// Turn a request failure into a [`NotifyError::Transport`] that names the
/// redacted URL and carries none of `secrets` or the URL's own secrets.
pub fn transport_error(err: reqwest::Error, url: &Url, secrets: &[&str]) -> NotifyError {
    let err = err.without_url();

    let mut message = format!("POST {}: {err}", redact_url(url));
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    let mut all: Vec<String> = url_secrets(url);
    all.extend(secrets.iter().map(|s| s.to_string()));
    NotifyError::Transport(scrub(&message, &all))
}
