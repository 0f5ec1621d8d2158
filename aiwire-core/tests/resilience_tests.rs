//! Tests for the retry/timeout policy using scripted operations
//!
//! These run under a paused tokio clock so backoff sleeps complete
//! instantly while still exercising the real scheduling path.

use aiwire_core::resilience::{execute, with_timeout, RetryPolicy};
use aiwire_core::{classify, AiError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Operation that fails with the scripted errors before succeeding.
struct Script {
    attempts: AtomicU32,
    failures: Vec<AiError>,
}

impl Script {
    fn new(failures: Vec<AiError>) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            failures,
        }
    }

    async fn call(&self) -> Result<&'static str, AiError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) as usize;
        match self.failures.get(attempt) {
            Some(error) => Err(error.clone()),
            None => Ok("success"),
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[tokio::test(start_paused = true)]
async fn succeeds_first_try_without_retrying() {
    let script = Script::new(vec![]);
    let policy = RetryPolicy::new(3);

    let result = execute(&policy, TIMEOUT, "openai", || script.call()).await;

    assert_eq!(result.unwrap(), "success");
    assert_eq!(script.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn auth_error_makes_exactly_one_attempt() {
    let script = Script::new(vec![classify("openai", "key rejected", Some(401))]);
    let policy = RetryPolicy::new(3);

    let result = execute(&policy, TIMEOUT, "openai", || script.call()).await;

    assert!(matches!(result.unwrap_err(), AiError::Auth { .. }));
    assert_eq!(script.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn raw_400_is_not_retried() {
    let script = Script::new(vec![classify("openai", "malformed body", Some(400))]);
    let policy = RetryPolicy::new(3);

    let result = execute(&policy, TIMEOUT, "openai", || script.call()).await;

    assert!(matches!(
        result.unwrap_err(),
        AiError::Service {
            status: Some(400),
            ..
        }
    ));
    assert_eq!(script.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn recovers_after_two_unavailable_responses() {
    // Two 503s then success: with max_retries=3 the third attempt wins.
    let script = Script::new(vec![
        classify("openai", "overloaded", Some(503)),
        classify("openai", "overloaded", Some(503)),
    ]);
    let policy = RetryPolicy::new(3);

    let result = execute(&policy, TIMEOUT, "openai", || script.call()).await;

    assert_eq!(result.unwrap(), "success");
    assert_eq!(script.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_return_the_last_error() {
    let failures = vec![
        classify("openai", "overloaded", Some(503)),
        classify("openai", "slow down", Some(429)),
        classify("openai", "still overloaded", Some(503)),
    ];
    let script = Script::new(failures);
    let policy = RetryPolicy::new(2);

    let result = execute(&policy, TIMEOUT, "openai", || script.call()).await;

    // Three attempts total (initial + 2 retries); the last failure surfaces.
    assert_eq!(script.attempts(), 3);
    match result.unwrap_err() {
        AiError::ServiceUnavailable { message, .. } => {
            assert!(message.contains("still overloaded"));
        }
        other => panic!("expected ServiceUnavailable, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn generic_errors_are_treated_as_transient() {
    let script = Script::new(vec![classify("openai", "mystery failure", None)]);
    let policy = RetryPolicy::new(1);

    let result = execute(&policy, TIMEOUT, "openai", || script.call()).await;

    assert_eq!(result.unwrap(), "success");
    assert_eq!(script.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_a_single_attempt() {
    let script = Script::new(vec![classify("openai", "overloaded", Some(503))]);
    let policy = RetryPolicy::no_retry();

    let result = execute(&policy, TIMEOUT, "openai", || script.call()).await;

    assert!(result.is_err());
    assert_eq!(script.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_race_produces_a_timeout_error() {
    let timeout = Duration::from_millis(500);

    let result: Result<(), _> = with_timeout("gemini", timeout, async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    })
    .await;

    match result.unwrap_err() {
        AiError::Timeout {
            provider,
            timeout_ms,
            ..
        } => {
            assert_eq!(provider, "gemini");
            assert_eq!(timeout_ms, Some(500));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn each_attempt_gets_a_fresh_timeout_window() {
    // First attempt hangs past the window, second returns immediately.
    let attempts = AtomicU32::new(0);
    let policy = RetryPolicy::new(1);

    let result = execute(&policy, Duration::from_millis(100), "openai", || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok::<_, AiError>("late success")
        }
    })
    .await;

    assert_eq!(result.unwrap(), "late success");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
