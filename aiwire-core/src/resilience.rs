//! Retry with exponential backoff plus a per-attempt timeout race
//!
//! Every outbound provider call goes through [`execute`]: retry wraps
//! timeout, so each attempt gets a fresh timeout window. Losing the race
//! abandons this layer's interest in the attempt; the remote side may keep
//! executing, which callers must treat as a documented limitation rather
//! than cancellation.

use crate::error::{AiError, AiResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Delay floor before the first retry (milliseconds)
    pub base_delay_ms: u64,

    /// Cap on the exponential term (milliseconds)
    pub max_delay_ms: u64,

    /// Uniform jitter added on top of the exponential term, in `[0, jitter_ms)`
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            jitter_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom retry budget and the default delay schedule.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Inclusive lower and exclusive upper bound of the delay applied after
    /// failed attempt `attempt` (0-indexed): `base * 2^attempt` capped at
    /// `max_delay_ms`, plus jitter in `[0, jitter_ms)`.
    pub fn delay_bounds(&self, attempt: u32) -> (u64, u64) {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(32)));
        let capped = exponential.min(self.max_delay_ms);
        (capped, capped + self.jitter_ms)
    }

    /// Sample a concrete delay for the given attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let (floor, _) = self.delay_bounds(attempt);
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(floor + jitter)
    }
}

/// Race a provider call against a timer.
///
/// The loser's future is dropped; the upstream request may still complete
/// (and bill) in the background.
pub async fn with_timeout<T, Fut>(provider: &str, timeout: Duration, future: Fut) -> AiResult<T>
where
    Fut: Future<Output = AiResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(AiError::Timeout {
            provider: provider.to_string(),
            message: format!("no response within {}ms", timeout.as_millis()),
            timeout_ms: Some(timeout.as_millis() as u64),
        }),
    }
}

/// Run `operation` with up to `policy.max_retries + 1` attempts, each inside
/// its own timeout window.
///
/// Non-transient errors short-circuit; once attempts are exhausted the last
/// classified error is returned verbatim.
pub async fn execute<T, F, Fut>(
    policy: &RetryPolicy,
    timeout: Duration,
    provider: &str,
    mut operation: F,
) -> AiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AiResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match with_timeout(provider, timeout, operation()).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_transient() || attempt >= policy.max_retries {
                    return Err(error);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    provider,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
