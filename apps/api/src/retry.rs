//! Retry-with-backoff for calls to external services.
//!
//! Exponential backoff with optional jitter and a hard delay cap. Errors are
//! classified by case-insensitive substring match of a pattern list against
//! the error's kind code, its HTTP-like status and its message.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Generic transient-failure markers.
pub const DEFAULT_RETRYABLE_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "rate_limit",
    "rate limit",
    "ratelimit",
    "too many requests",
    "429",
    "500",
    "502",
    "503",
    "504",
    "econnreset",
    "connection reset",
    "connection refused",
    "enotfound",
    "dns",
    "fetch failed",
    "network",
    "malformed_output",
];

/// Only rate-limit signatures; used for the job-search provider.
pub const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate_limit",
    "rate limit",
    "ratelimit",
    "too many requests",
    "429",
];

/// What the executor needs to know about an error to classify it.
pub trait Classify {
    fn code(&self) -> &str;
    fn status(&self) -> Option<u16>;
    fn message(&self) -> &str;
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Hard cap on any single backoff sleep.
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Multiplies each delay by a uniform factor in [0.5, 1.5).
    pub jitter: bool,
    pub retryable_patterns: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    pub fn fast() -> Self {
        Self::with_patterns(
            2,
            Duration::from_millis(500),
            Duration::from_secs(5),
            1.5,
            DEFAULT_RETRYABLE_PATTERNS,
        )
    }

    pub fn standard() -> Self {
        Self::with_patterns(
            3,
            Duration::from_millis(1000),
            Duration::from_secs(10),
            2.0,
            DEFAULT_RETRYABLE_PATTERNS,
        )
    }

    pub fn aggressive() -> Self {
        Self::with_patterns(
            5,
            Duration::from_millis(2000),
            Duration::from_secs(30),
            2.0,
            DEFAULT_RETRYABLE_PATTERNS,
        )
    }

    pub fn rate_limited() -> Self {
        Self::with_patterns(
            3,
            Duration::from_millis(5000),
            Duration::from_secs(60),
            2.0,
            RATE_LIMIT_PATTERNS,
        )
    }

    fn with_patterns(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
        patterns: &[&str],
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            backoff_multiplier,
            jitter: true,
            retryable_patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry number `retry` (0-indexed), truncated to whole
    /// milliseconds and never above `max_delay`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let max_ms = self.max_delay.as_millis() as f64;
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let exp_ms = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let mut delay_ms = exp_ms.min(max_ms);

        if self.jitter {
            let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
            delay_ms = (delay_ms * factor).min(max_ms);
        }

        if !delay_ms.is_finite() || delay_ms < 0.0 {
            delay_ms = max_ms;
        }
        Duration::from_millis(delay_ms as u64)
    }
}

/// Returns true if any pattern occurs (case-insensitively) in the error's
/// code, status or message.
pub fn is_retryable<E: Classify>(err: &E, patterns: &[String]) -> bool {
    let code = err.code().to_lowercase();
    let message = err.message().to_lowercase();
    let status = err.status().map(|s| s.to_string());

    patterns
        .iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty())
        .any(|p| {
            code.contains(&p)
                || message.contains(&p)
                || status.as_deref().is_some_and(|s| s.contains(&p))
        })
}

type RetryCallback<'a, E> = Box<dyn Fn(u32, Duration, &E) + Send + Sync + 'a>;
type SuccessCallback<'a> = Box<dyn Fn(u32) + Send + Sync + 'a>;
type ExhaustedCallback<'a, E> = Box<dyn Fn(u32, &E) + Send + Sync + 'a>;

/// Optional observers. Attempt numbers passed to them are 1-based.
pub struct RetryHooks<'a, E> {
    on_retry: Option<RetryCallback<'a, E>>,
    on_success: Option<SuccessCallback<'a>>,
    on_exhausted: Option<ExhaustedCallback<'a, E>>,
}

impl<E> Default for RetryHooks<'_, E> {
    fn default() -> Self {
        Self {
            on_retry: None,
            on_success: None,
            on_exhausted: None,
        }
    }
}

impl<'a, E> RetryHooks<'a, E> {
    /// Called after the backoff sleep, right before the next attempt, with
    /// the number of the attempt that failed.
    pub fn on_retry(mut self, f: impl Fn(u32, Duration, &E) + Send + Sync + 'a) -> Self {
        self.on_retry = Some(Box::new(f));
        self
    }

    pub fn on_success(mut self, f: impl Fn(u32) + Send + Sync + 'a) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_exhausted(mut self, f: impl Fn(u32, &E) + Send + Sync + 'a) -> Self {
        self.on_exhausted = Some(Box::new(f));
        self
    }
}

/// Execute an async operation with retry-and-backoff.
///
/// Non-retryable errors propagate after the first failure. Cancellation is
/// checked before every retry and interrupts the backoff sleep; in both cases
/// the last error is returned and no further attempt is issued.
pub async fn execute<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    hooks: &RetryHooks<'_, E>,
    mut operation: F,
) -> Result<T, E>
where
    E: Classify + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if let Some(cb) = &hooks.on_success {
                    cb(attempt + 1);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err, &policy.retryable_patterns) {
            debug!(code = err.code(), "Non-retryable error: {err}");
            return Err(err);
        }

        if attempt + 1 >= max_attempts {
            warn!(attempts = attempt + 1, "Retries exhausted: {err}");
            if let Some(cb) = &hooks.on_exhausted {
                cb(attempt + 1, &err);
            }
            return Err(err);
        }

        if cancel.is_cancelled() {
            debug!("Cancelled; abandoning retry after attempt {}", attempt + 1);
            return Err(err);
        }

        let delay = policy.delay_for_attempt(attempt);
        warn!(
            attempt = attempt + 1,
            max = max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after transient error"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Cancelled during backoff");
                return Err(err);
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if let Some(cb) = &hooks.on_retry {
            cb(attempt + 1, delay, &err);
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct TestError {
        code: &'static str,
        status: Option<u16>,
        message: &'static str,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}: {}", self.code, self.message)
        }
    }

    impl Classify for TestError {
        fn code(&self) -> &str {
            self.code
        }
        fn status(&self) -> Option<u16> {
            self.status
        }
        fn message(&self) -> &str {
            self.message
        }
    }

    fn transient() -> TestError {
        TestError {
            code: "UPSTREAM_ERROR",
            status: Some(503),
            message: "service unavailable",
        }
    }

    fn permanent() -> TestError {
        TestError {
            code: "AUTH_FAILED",
            status: Some(401),
            message: "bad credentials",
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_n_transient_failures() {
        let policy = RetryPolicy::standard();
        let cancel = CancellationToken::new();
        let retries = AtomicU32::new(0);
        let delays = Mutex::new(Vec::new());
        let succeeded_on = AtomicU32::new(0);
        let hooks = RetryHooks::default()
            .on_retry(|_, delay, _: &TestError| {
                retries.fetch_add(1, Ordering::SeqCst);
                delays.lock().unwrap().push(delay);
            })
            .on_success(|attempt| succeeded_on.store(attempt, Ordering::SeqCst));

        let mut calls = 0;
        let result = execute(&policy, &cancel, &hooks, || {
            calls += 1;
            let n = calls;
            async move {
                if n <= 2 {
                    Err(transient())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
        assert_eq!(succeeded_on.load(Ordering::SeqCst), 3);
        for delay in delays.lock().unwrap().iter() {
            assert!(*delay <= policy.max_delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_invoked_once() {
        let policy = RetryPolicy::aggressive();
        let cancel = CancellationToken::new();
        let hooks = RetryHooks::<TestError>::default();

        let mut calls = 0;
        let result: Result<(), _> = execute(&policy, &cancel, &hooks, || {
            calls += 1;
            async { Err(permanent()) }
        })
        .await;

        assert_eq!(result.unwrap_err().code, "AUTH_FAILED");
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_total_attempts_and_last_error() {
        let policy = RetryPolicy::fast();
        let cancel = CancellationToken::new();
        let exhausted_after = AtomicU32::new(0);
        let hooks = RetryHooks::default()
            .on_exhausted(|total, _: &TestError| exhausted_after.store(total, Ordering::SeqCst));

        let mut calls = 0;
        let result: Result<(), _> = execute(&policy, &cancel, &hooks, || {
            calls += 1;
            async { Err(transient()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 2);
        assert_eq!(exhausted_after.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_policy_ignores_server_errors() {
        let policy = RetryPolicy::rate_limited();
        let cancel = CancellationToken::new();
        let hooks = RetryHooks::<TestError>::default();

        let mut calls = 0;
        let _: Result<(), _> = execute(&policy, &cancel, &hooks, || {
            calls += 1;
            async { Err(transient()) }
        })
        .await;
        assert_eq!(calls, 1);

        let mut calls = 0;
        let _: Result<(), _> = execute(&policy, &cancel, &hooks, || {
            calls += 1;
            async {
                Err(TestError {
                    code: "RATE_LIMITED",
                    status: Some(429),
                    message: "slow down",
                })
            }
        })
        .await;
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_pending_retries() {
        let policy = RetryPolicy::standard();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let hooks = RetryHooks::<TestError>::default();

        let mut calls = 0;
        let result: Result<(), _> = execute(&policy, &cancel, &hooks, || {
            calls += 1;
            async { Err(transient()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_delay_respects_max_cap() {
        let policy = RetryPolicy::standard().without_jitter();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(20), policy.max_delay);
    }

    #[test]
    fn test_delay_uses_fractional_multiplier() {
        let policy = RetryPolicy::fast().without_jitter();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(750));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1125));
    }

    #[test]
    fn test_jittered_delay_stays_in_band() {
        let policy = RetryPolicy::standard();
        for _ in 0..200 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(500), "{delay:?}");
            assert!(delay < Duration::from_millis(1500), "{delay:?}");
        }
        for _ in 0..200 {
            assert!(policy.delay_for_attempt(10) <= policy.max_delay);
        }
    }

    #[test]
    fn test_classification_is_case_insensitive_across_fields() {
        let patterns: Vec<String> = vec!["TIMEOUT".to_string()];
        let err = TestError {
            code: "UNKNOWN",
            status: None,
            message: "request timeout after 30s",
        };
        assert!(is_retryable(&err, &patterns));

        let status_only: Vec<String> = vec!["502".to_string()];
        let err = TestError {
            code: "UPSTREAM_ERROR",
            status: Some(502),
            message: "bad gateway",
        };
        assert!(is_retryable(&err, &status_only));
        assert!(!is_retryable(&permanent(), &status_only));
    }
}
