//! Bounded retry with backoff for rate limits and transient failures.

use std::time::Duration;

use crate::http::HttpMethod;
use crate::transport::TransportError;

const RATE_LIMITED: u16 = 429;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt`, capped at `max`, optionally with +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(3),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = (base.as_secs_f64() * factor.powi(exponent)).max(0.0);
                let capped = Duration::try_from_secs_f64(seconds).map_or(max, |delay| delay.min(max));
                if !jitter {
                    return capped;
                }

                let millis = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX);
                let spread = millis / 2;
                let offset = fastrand::u64(0..=spread.saturating_mul(2));
                Duration::from_millis((millis - spread).saturating_add(offset))
            }
        }
    }
}

/// When and how often the client sends a failed request again.
///
/// A request is attempted at most `max_retries + 1` times. Once the budget is
/// spent the last response is classified like any other error response.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Status codes worth retrying. lexoffice answers 429 once a client
    /// exceeds its request quota.
    pub retry_on_status: Vec<u16>,
    /// Retry connect and timeout failures reported as retryable by the transport.
    pub retry_on_transport: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 4,
            backoff: Backoff::default(),
            retry_on_status: vec![429, 502, 503, 504],
            retry_on_transport: true,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether another attempt may follow the `attempt`-th retry (0-based).
    pub fn allows(&self, attempt: u32) -> bool {
        self.enabled && attempt < self.max_retries
    }

    /// `retry_on_status` applies to idempotent methods. A POST is only sent
    /// again after 429, which lexoffice answers before processing anything.
    pub fn should_retry_status(&self, method: HttpMethod, status: u16) -> bool {
        self.retry_on_status.contains(&status) && (method.is_idempotent() || status == RATE_LIMITED)
    }

    /// A POST is only sent again if it never left the client.
    pub fn should_retry_transport(&self, method: HttpMethod, err: &TransportError) -> bool {
        self.retry_on_transport && err.retryable() && (method.is_idempotent() || !err.may_have_been_sent())
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}
