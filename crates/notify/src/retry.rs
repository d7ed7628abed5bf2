//! HTTP status → retry decision.

use crate::traits::NotifyError;

/// Decides whether a response status is success, retryable or permanent.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// `(false, None)` on success, otherwise whether to retry and why it failed.
    fn classify(&self, status: u16) -> (bool, Option<NotifyError>);
}

/// Default policy: 2xx succeeds, 5xx is retried, everything else is permanent.
///
/// Statuspal documents no rate-limit semantics, so 429 is permanent unless
/// listed in `retry_codes`.
#[derive(Debug, Clone, Default)]
pub struct Retrier {
    retry_codes: Vec<u16>,
}

impl Retrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additional status codes that are retryable on top of 5xx.
    pub fn with_retry_codes(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            retry_codes: codes.into_iter().collect(),
        }
    }
}

impl RetryPolicy for Retrier {
    fn classify(&self, status: u16) -> (bool, Option<NotifyError>) {
        if (200..300).contains(&status) {
            return (false, None);
        }
        let retryable = (500..600).contains(&status) || self.retry_codes.contains(&status);
        (retryable, Some(NotifyError::UnexpectedStatus { status }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_codes() {
        let retrier = Retrier::new();
        for status in 200..300 {
            let (retry, err) = retrier.classify(status);
            assert!(!retry, "status {status}");
            assert!(err.is_none(), "status {status}");
        }
    }

    #[test]
    fn server_errors_are_retryable() {
        let retrier = Retrier::new();
        for status in 500..600 {
            let (retry, err) = retrier.classify(status);
            assert!(retry, "status {status}");
            assert!(matches!(err, Some(NotifyError::UnexpectedStatus { status: s }) if s == status));
        }
    }

    #[test]
    fn other_failures_are_permanent() {
        let retrier = Retrier::new();
        for status in (100..200).chain(300..500).chain(600..1000) {
            let (retry, err) = retrier.classify(status);
            assert!(!retry, "status {status}");
            assert!(err.is_some(), "status {status}");
        }
    }

    #[test]
    fn rate_limit_is_permanent_by_default() {
        assert!(!Retrier::new().classify(429).0);
    }

    #[test]
    fn extra_retry_codes() {
        let retrier = Retrier::with_retry_codes([429, 408]);
        assert!(retrier.classify(429).0);
        assert!(retrier.classify(408).0);
        assert!(!retrier.classify(404).0);
        assert_eq!(retrier.classify(200).0, false);
    }

    #[test]
    fn error_mentions_status() {
        let (_, err) = Retrier::new().classify(404);
        assert_eq!(err.unwrap().to_string(), "Unexpected status code 404");
    }
}
