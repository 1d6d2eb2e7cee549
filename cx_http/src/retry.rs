use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use cx_types::ClientError;
use cx_types::ErrorKind;
use cx_types::Result;
use cx_types::RetrySummary;
use rand::Rng;
use tracing::debug;
use tracing::warn;

/// Exponential backoff parameters
///
/// `max_retries` counts attempts, not re-attempts: a policy with `max_retries = 3` calls the
/// operation at most three times. The delay bound starts at `initial_delay`, is multiplied by
/// `backoff_factor` after every failure and never exceeds `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter: bool,
    retryable: BTreeSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: true,
            retryable: BTreeSet::from([ErrorKind::Connect, ErrorKind::Timeout]),
        }
    }
}

impl RetryPolicy {
    /// Validated policy with jitter on and connect/timeout errors retryable
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration, backoff_factor: f64) -> Result<Self> {
        if max_retries == 0 {
            return Err(ClientError::InvalidConfig("max_retries must be at least 1".to_string()));
        }
        if initial_delay.is_zero() {
            return Err(ClientError::InvalidConfig("initial_delay must be greater than 0".to_string()));
        }
        if max_delay < initial_delay {
            return Err(ClientError::InvalidConfig(format!("max_delay {max_delay:?} is shorter than initial_delay {initial_delay:?}")));
        }
        if !backoff_factor.is_finite() || backoff_factor < 1.0 {
            return Err(ClientError::InvalidConfig(format!("backoff_factor must be a finite number >= 1, got {backoff_factor}")));
        }

        Ok(Self { max_retries, initial_delay, max_delay, backoff_factor, ..Default::default() })
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the set of error kinds that trigger another attempt
    pub fn with_retryable<I: IntoIterator<Item = ErrorKind>>(mut self, kinds: I) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    pub fn retryable_kinds(&self) -> &BTreeSet<ErrorKind> {
        &self.retryable
    }

    /// Either the error itself or whatever it wraps must be whitelisted
    ///
    /// A connect error raised by a before-hook's store call reaches the retry loop wrapped in
    /// `CallbackAborted`; its root cause decides.
    pub fn is_retryable(&self, err: &ClientError) -> bool {
        self.retryable.contains(&err.kind()) || self.retryable.contains(&err.root_cause().kind())
    }

    /// Bound that follows `delay`, capped at `max_delay`
    pub fn next_delay(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_factor).unwrap_or(self.max_delay).min(self.max_delay)
    }

    /// Delay bounds slept before attempts 2..=max_retries
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        let mut schedule = Vec::with_capacity(self.max_retries.saturating_sub(1) as usize);
        let mut delay = self.initial_delay;
        for _ in 1..self.max_retries {
            schedule.push(delay);
            delay = self.next_delay(delay);
        }
        schedule
    }

    pub fn summary(&self) -> RetrySummary {
        RetrySummary {
            max_retries: self.max_retries,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_factor: self.backoff_factor,
            jitter: self.jitter,
        }
    }
}

/// Runs an async operation under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryStrategy {
    policy: RetryPolicy,
}

impl RetryStrategy {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Actual sleep for a delay bound: uniform in `[0, delay)` with jitter, else `delay`
    fn sleep_for(&self, delay: Duration) -> Duration {
        if !self.policy.jitter || delay.is_zero() {
            return delay;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..delay.as_secs_f64()))
    }

    /// Call `operation` until it succeeds, fails with a non-retryable error, or runs out of attempts
    ///
    /// Non-retryable errors come back unchanged on first occurrence. After `max_retries`
    /// retryable failures the last one is returned inside `RetryExhausted`.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.policy.initial_delay;
        let mut attempt: u32 = 0;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.policy.is_retryable(&err) {
                debug!(kind = %err.kind(), attempt, "Error is not retryable");
                return Err(err);
            }

            attempt += 1;
            if attempt >= self.policy.max_retries {
                warn!(attempts = attempt, error = %err, "Retries exhausted");
                return Err(ClientError::RetryExhausted { attempts: attempt, policy: self.policy.summary(), source: Box::new(err) });
            }

            let sleep = self.sleep_for(delay);
            warn!(attempt, max_retries = self.policy.max_retries, delay_ms = sleep.as_millis() as u64, error = %err, "Retrying after transient failure");
            tokio::time::sleep(sleep).await;
            delay = self.policy.next_delay(delay);
        }
    }
}
