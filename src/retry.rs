//! Classification of remote OCR failures for the retry loop.

use std::time::Duration;

use reqwest::StatusCode;

/// How should the retry loop react to a failed attempt?
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// We were throttled. Back off linearly with the attempt number.
    RateLimited,

    /// The failure may resolve on its own. Wait the base delay and retry.
    Transient,

    /// The request itself is bad. Retrying will never help.
    Fatal,
}

impl RetryClass {
    /// Classify an HTTP status code.
    ///
    /// We treat 429 as rate limiting, other client errors as fatal (a
    /// malformed request won't get better), and everything else as
    /// transient. This mirrors the status codes we've actually observed
    /// resolving on retry: 429, 502, 503, 504.
    pub fn of_status(status: StatusCode) -> RetryClass {
        if status == StatusCode::TOO_MANY_REQUESTS {
            RetryClass::RateLimited
        } else if status.is_client_error() {
            RetryClass::Fatal
        } else {
            RetryClass::Transient
        }
    }

    /// Classify a `reqwest` error that may or may not carry a status.
    ///
    /// Errors without a status (connection resets, timeouts) are assumed
    /// transient; `reqwest` doesn't expose enough detail to be certain
    /// which of them are permanent.
    pub fn of_request_error(error: &reqwest::Error) -> RetryClass {
        match error.status() {
            Some(status) => Self::of_status(status),
            None => RetryClass::Transient,
        }
    }

    /// How long to sleep before the next attempt, given the base retry
    /// delay and the 1-based number of the attempt that just failed.
    /// Returns `None` if we should give up immediately.
    pub fn backoff(self, retry_delay: Duration, attempt: u32) -> Option<Duration> {
        match self {
            RetryClass::RateLimited => Some(retry_delay * attempt),
            RetryClass::Transient => Some(retry_delay),
            RetryClass::Fatal => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert_eq!(
            RetryClass::of_status(StatusCode::TOO_MANY_REQUESTS),
            RetryClass::RateLimited
        );
        assert_eq!(
            RetryClass::of_status(StatusCode::BAD_REQUEST),
            RetryClass::Fatal
        );
        assert_eq!(
            RetryClass::of_status(StatusCode::UNAUTHORIZED),
            RetryClass::Fatal
        );
        assert_eq!(
            RetryClass::of_status(StatusCode::BAD_GATEWAY),
            RetryClass::Transient
        );
        assert_eq!(
            RetryClass::of_status(StatusCode::SERVICE_UNAVAILABLE),
            RetryClass::Transient
        );
    }

    #[test]
    fn rate_limit_backoff_scales_with_attempt() {
        let base = Duration::from_secs(2);
        assert_eq!(
            RetryClass::RateLimited.backoff(base, 1),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            RetryClass::RateLimited.backoff(base, 3),
            Some(Duration::from_secs(6))
        );
        assert_eq!(RetryClass::Transient.backoff(base, 3), Some(base));
        assert_eq!(RetryClass::Fatal.backoff(base, 1), None);
    }
}
