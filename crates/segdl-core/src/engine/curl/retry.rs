//! Per-segment retry: error classification and capped exponential backoff.
//!
//! A failure that exhausts the policy (or is not retryable at all) is final
//! for that connection only; the pool then moves the segment to another one.

use std::fmt;
use std::time::Duration;

use super::Interrupt;
use crate::config::RetryConfig;

/// Failure of one segment (or stream) on one connection.
#[derive(Debug)]
pub enum SegmentError {
    Curl(curl::Error),
    /// Non-2xx response.
    Http(u32),
    /// Body ended before the expected number of bytes.
    PartialTransfer { expected: u64, received: u64 },
    /// Server answered 200 (the whole body) to a ranged request.
    RangeIgnored,
    /// Local write failed. Never retried.
    Storage(std::io::Error),
    /// Aborted because cancellation was requested.
    Cancelled,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::Curl(e) => write!(f, "{}", e),
            SegmentError::Http(code) => write!(f, "HTTP {}", code),
            SegmentError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            SegmentError::RangeIgnored => write!(f, "server ignored the Range header"),
            SegmentError::Storage(e) => write!(f, "storage: {}", e),
            SegmentError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentError::Curl(e) => Some(e),
            SegmentError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Throttled,
    Connection,
    Http5xx(u16),
    /// Truncated body; worth another try on the same connection.
    Short,
    Other,
}

pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

pub fn classify(e: &SegmentError) -> ErrorKind {
    match e {
        SegmentError::Curl(ce) => classify_curl_error(ce),
        SegmentError::Http(code) => classify_http_status(*code),
        SegmentError::PartialTransfer { .. } => ErrorKind::Short,
        SegmentError::RangeIgnored | SegmentError::Storage(_) | SegmentError::Cancelled => {
            ErrorKind::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per segment on one connection, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// `attempt` is 1-based.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || kind == ErrorKind::Other {
            return RetryDecision::NoRetry;
        }
        let factor = 1u32 << attempt.saturating_sub(1).min(8);
        RetryDecision::RetryAfter(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Runs `f` until it succeeds, the policy gives up, or `interrupt` fires
/// (checked between attempts and while backing off).
pub(super) fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    interrupt: &Interrupt,
    mut f: F,
) -> Result<T, SegmentError>
where
    F: FnMut() -> Result<T, SegmentError>,
{
    let mut attempt = 1u32;
    loop {
        if interrupt.requested() {
            return Err(SegmentError::Cancelled);
        }
        let err = match f() {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let delay = match policy.decide(attempt, classify(&err)) {
            RetryDecision::NoRetry => return Err(err),
            RetryDecision::RetryAfter(d) => d,
        };
        tracing::debug!(attempt, ?delay, "retrying after: {}", err);
        let mut left = delay;
        while !left.is_zero() {
            if interrupt.requested() {
                return Err(SegmentError::Cancelled);
            }
            let step = left.min(SLEEP_SLICE);
            std::thread::sleep(step);
            left -= step;
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use std::cell::Cell;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn http_classification() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
        assert_eq!(classify_http_status(502), ErrorKind::Http5xx(502));
        assert_eq!(classify_http_status(404), ErrorKind::Other);
        assert_eq!(classify(&SegmentError::RangeIgnored), ErrorKind::Other);
        assert_eq!(
            classify(&SegmentError::PartialTransfer { expected: 2, received: 1 }),
            ErrorKind::Short
        );
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let p = RetryPolicy {
            max_attempts: 20,
            ..RetryPolicy::default()
        };
        let delay = |a| match p.decide(a, ErrorKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::NoRetry => panic!("expected retry"),
        };
        assert_eq!(delay(1), Duration::from_millis(250));
        assert_eq!(delay(2), Duration::from_millis(500));
        assert_eq!(delay(12), p.max_delay);
        assert_eq!(p.decide(1, ErrorKind::Other), RetryDecision::NoRetry);
        assert_eq!(p.decide(20, ErrorKind::Timeout), RetryDecision::NoRetry);
    }

    #[test]
    fn policy_from_config() {
        let cfg = RetryConfig {
            max_attempts: 0,
            base_delay_secs: 0.5,
            max_delay_secs: 3,
        };
        let p = RetryPolicy::from(&cfg);
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.base_delay, Duration::from_millis(500));
        assert_eq!(p.max_delay, Duration::from_secs(3));
    }

    #[test]
    fn retries_until_success() {
        let calls = Cell::new(0);
        let interrupt = Interrupt::new(CancelToken::new());
        let res = run_with_retry(&fast_policy(5), &interrupt, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(SegmentError::Http(503))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(res.unwrap(), 3);
    }

    #[test]
    fn non_retryable_returns_immediately() {
        let calls = Cell::new(0);
        let interrupt = Interrupt::new(CancelToken::new());
        let res: Result<(), _> = run_with_retry(&fast_policy(5), &interrupt, || {
            calls.set(calls.get() + 1);
            Err(SegmentError::Http(404))
        });
        assert!(matches!(res, Err(SegmentError::Http(404))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn cancelled_before_first_attempt() {
        let token = CancelToken::new();
        token.cancel();
        let interrupt = Interrupt::new(token);
        let res: Result<(), _> = run_with_retry(&fast_policy(5), &interrupt, || Ok(()));
        assert!(matches!(res, Err(SegmentError::Cancelled)));
    }
}
