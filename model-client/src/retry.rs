use crate::error::TransportError;
use crate::request::Request;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const BACKOFF_FACTOR: f64 = 2.0;
const JITTER_LOW: f64 = 0.9;
const JITTER_HIGH: f64 = 1.1;

/// Which failures are worth another try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOn {
    pub retry_429: bool,
    pub retry_5xx: bool,
    pub retry_transport: bool,
}

impl RetryOn {
    fn should_retry(&self, err: &TransportError) -> bool {
        match err {
            TransportError::Http { status, .. } => {
                (self.retry_429 && status.as_u16() == 429)
                    || (self.retry_5xx && status.is_server_error())
            }
            TransportError::Timeout | TransportError::Network(_) => self.retry_transport,
            TransportError::RetryLimit { .. } | TransportError::Build(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u64,
    pub base_delay: Duration,
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            retry_on: RetryOn {
                retry_429: true,
                retry_5xx: true,
                retry_transport: true,
            },
        }
    }
}

impl RetryPolicy {
    /// Upper bound on the time spent sleeping between attempts.
    pub fn max_total_backoff(&self) -> Duration {
        (1..self.max_attempts.max(1))
            .map(|attempt| {
                let exp = BACKOFF_FACTOR.powi(attempt.saturating_sub(1) as i32);
                self.base_delay.mul_f64(exp * JITTER_HIGH)
            })
            .sum()
    }
}

/// Exponential backoff with ±10% jitter. `attempt` is 1-based.
pub fn backoff(base_delay: Duration, attempt: u64) -> Duration {
    let exp = BACKOFF_FACTOR.powi(attempt.saturating_sub(1) as i32);
    let base = (base_delay.as_millis() as f64 * exp) as u64;
    let jitter = rand::rng().random_range(JITTER_LOW..JITTER_HIGH);
    Duration::from_millis((base as f64 * jitter) as u64)
}

/// Runs `send` with a fresh request from `make_request` until it succeeds, a
/// non-retryable error occurs, or the policy's attempt budget is spent.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut make_request: impl FnMut() -> Request,
    mut send: F,
) -> Result<T, TransportError>
where
    F: FnMut(Request) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match send(make_request()).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && policy.retry_on.should_retry(&err) => {
                let delay = backoff(policy.base_delay, attempt);
                tracing::warn!(attempt, ?delay, error = %err, "retrying model request");
                sleep(delay).await;
            }
            Err(err) if attempt == max_attempts && policy.retry_on.should_retry(&err) => {
                tracing::warn!(attempt, error = %err, "model request failed on final attempt");
                return Err(TransportError::RetryLimit {
                    attempts: max_attempts,
                });
            }
            Err(err) => return Err(err),
        }
    }
    Err(TransportError::RetryLimit {
        attempts: max_attempts,
    })
}
