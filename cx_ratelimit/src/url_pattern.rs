use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use cx_types::ClientError;
use cx_types::RequestCallback;
use cx_types::RequestContext;
use cx_types::ResponseContext;
use cx_types::Result;
use futures::future::BoxFuture;
use regex::RegexSet;
use time::OffsetDateTime;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::DEFAULT_MAX_SAFE_COUNT;
use crate::config::DEFAULT_WINDOW_SECONDS;
use crate::config::RateLimitConfig;
use crate::key_builder::DEFAULT_KEY_PREFIX;
use crate::key_builder::RateLimitWindow;
use crate::key_builder::label_for_patterns;
use crate::store::SharedCounterStore;
use crate::time::TimeSource;

/// URL-path patterns owned by one limiter
///
/// Each pattern is a regex searched anywhere in the path, so plain substrings such as
/// `/v1/ticker` work as-is. Declaration order never matters.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    compiled: RegexSet,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if patterns.is_empty() {
            return Err(ClientError::InvalidConfig("at least one URL pattern is required".to_string()));
        }
        let compiled = RegexSet::new(&patterns).map_err(|e| ClientError::InvalidConfig(format!("invalid URL pattern: {e}")))?;
        Ok(Self { patterns, compiled })
    }

    #[inline]
    pub fn matches(&self, path: &str) -> bool {
        self.compiled.is_match(path)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// `PATTERN_xxxxxxxx` label, identical for any ordering of the same patterns
    pub fn label(&self) -> String {
        label_for_patterns(&self.patterns)
    }
}

/// Fixed-window admission control for requests whose path matches a pattern set
///
/// The count lives in a [`SharedCounterStore`] so that every process using the same key
/// prefix and label draws on one budget. Before a matching request the current count is
/// read and the request is rejected once it reaches `max_safe_count`; after the response
/// (whatever its status) the count is incremented with a TTL of two windows.
///
/// Reading and incrementing are separate round trips, so concurrent callers can push the
/// count past the limit by roughly the number of requests in flight. Treat `max_safe_count`
/// as a soft ceiling and leave headroom below the venue's real limit.
///
/// Only obtainable through [`UrlPatternRateLimiterBuilder::build`], which pings the store.
pub struct UrlPatternRateLimiter {
    store: Arc<dyn SharedCounterStore>,
    patterns: PatternSet,
    window_seconds: u64,
    max_safe_count: u64,
    label: String,
    key_prefix: String,
    clock: TimeSource,
    last_known_count: AtomicU64,
    limit_exceeded: AtomicBool,
}

impl UrlPatternRateLimiter {
    pub fn builder(store: Arc<dyn SharedCounterStore>) -> UrlPatternRateLimiterBuilder {
        UrlPatternRateLimiterBuilder::new(store)
    }

    /// Build and health-check a limiter from its configuration block
    pub async fn from_config(store: Arc<dyn SharedCounterStore>, config: &RateLimitConfig) -> Result<Self> {
        let mut builder = Self::builder(store)
            .patterns(config.url_patterns.iter().cloned())
            .window_seconds(config.window_seconds)
            .max_safe_count(config.max_safe_count);
        if let Some(label) = &config.label {
            builder = builder.label(label.clone());
        }
        if let Some(prefix) = &config.key_prefix {
            builder = builder.key_prefix(prefix.clone());
        }
        builder.build().await
    }

    fn window(&self) -> RateLimitWindow {
        RateLimitWindow::at(&self.key_prefix, &self.label, self.window_seconds, self.clock.now_secs())
    }

    /// Store key for the window the clock is in now
    pub fn current_key(&self) -> String {
        self.window().key()
    }

    pub fn patterns(&self) -> &[String] {
        self.patterns.patterns()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    pub fn max_safe_count(&self) -> u64 {
        self.max_safe_count
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.matches(path)
    }

    /// Count observed by the most recent store round trip
    pub fn last_known_count(&self) -> u64 {
        self.last_known_count.load(Ordering::Acquire)
    }

    /// Attempts left in the current window according to the last observed count
    pub fn remaining(&self) -> u64 {
        self.max_safe_count.saturating_sub(self.last_known_count())
    }

    /// True after a rejection, until the next admitted request
    pub fn is_limit_exceeded(&self) -> bool {
        self.limit_exceeded.load(Ordering::Acquire)
    }

    pub fn seconds_until_reset(&self) -> u64 {
        self.window().seconds_remaining(self.clock.now_secs())
    }

    /// UTC instant at which the current window ends
    pub fn reset_at(&self) -> OffsetDateTime {
        let end = i64::try_from(self.window().end_secs()).unwrap_or(i64::MAX);
        OffsetDateTime::from_unix_timestamp(end).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Live read of the current window's count
    pub async fn count(&self) -> Result<u64> {
        let count = self.store.get(&self.current_key()).await?;
        self.last_known_count.store(count, Ordering::Release);
        Ok(count)
    }

    async fn admit(&self, request: &RequestContext) -> Result<()> {
        if !self.patterns.matches(request.path()) {
            return Ok(());
        }

        let key = self.current_key();
        let count = self.store.get(&key).await?;
        self.last_known_count.store(count, Ordering::Release);

        if count >= self.max_safe_count {
            self.limit_exceeded.store(true, Ordering::Release);
            warn!(key = %key, count, max_safe_count = self.max_safe_count, path = request.path(), "URL pattern limit reached, rejecting request");
            return Err(ClientError::AdmissionRejected {
                count,
                max_safe_count: self.max_safe_count,
                window_seconds: self.window_seconds,
                patterns: self.patterns.patterns().to_vec(),
            });
        }

        self.limit_exceeded.store(false, Ordering::Release);
        debug!(key = %key, count, max_safe_count = self.max_safe_count, "Admitted request");
        Ok(())
    }

    async fn record(&self, response: &ResponseContext) -> Result<()> {
        if !self.patterns.matches(response.request_path()) {
            return Ok(());
        }

        let window = self.window();
        let key = window.key();
        let count = self.store.increment_and_expire(&key, window.ttl_seconds()).await?;
        self.last_known_count.store(count, Ordering::Release);
        debug!(key = %key, count, status = response.status_code(), "Recorded attempt");
        Ok(())
    }
}

impl RequestCallback for UrlPatternRateLimiter {
    fn name(&self) -> &str {
        "url_pattern_rate_limiter"
    }

    fn before_request<'a>(&'a self, request: &'a RequestContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.admit(request))
    }

    fn after_request<'a>(&'a self, response: &'a ResponseContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.record(response))
    }
}

impl fmt::Display for UrlPatternRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UrlPatternRateLimiter(count={}/{}, period={}s, reset={}, exceeded={}, patterns=[{}], key={})",
            self.last_known_count(),
            self.max_safe_count,
            self.window_seconds,
            self.reset_at(),
            self.is_limit_exceeded(),
            self.patterns.patterns().join(", "),
            self.current_key()
        )
    }
}

impl fmt::Debug for UrlPatternRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlPatternRateLimiter")
            .field("patterns", &self.patterns.patterns())
            .field("window_seconds", &self.window_seconds)
            .field("max_safe_count", &self.max_safe_count)
            .field("label", &self.label)
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

/// Builder for a URL-pattern rate limiter
pub struct UrlPatternRateLimiterBuilder {
    store: Arc<dyn SharedCounterStore>,
    patterns: Vec<String>,
    window_seconds: u64,
    max_safe_count: u64,
    label: Option<String>,
    key_prefix: Option<String>,
    clock: TimeSource,
}

impl UrlPatternRateLimiterBuilder {
    pub fn new(store: Arc<dyn SharedCounterStore>) -> Self {
        Self {
            store,
            patterns: Vec::new(),
            window_seconds: DEFAULT_WINDOW_SECONDS,
            max_safe_count: DEFAULT_MAX_SAFE_COUNT,
            label: None,
            key_prefix: None,
            clock: TimeSource::System,
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn window_seconds(mut self, window_seconds: u64) -> Self {
        self.window_seconds = window_seconds;
        self
    }

    /// `0` rejects every matching request
    pub fn max_safe_count(mut self, max_safe_count: u64) -> Self {
        self.max_safe_count = max_safe_count;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(key_prefix.into());
        self
    }

    pub fn time_source(mut self, clock: TimeSource) -> Self {
        self.clock = clock;
        self
    }

    /// Validate, ping the store once, and hand back a ready limiter
    ///
    /// An unreachable store yields `StoreUnavailable` and no limiter.
    pub async fn build(self) -> Result<UrlPatternRateLimiter> {
        if self.window_seconds == 0 {
            return Err(ClientError::InvalidConfig("window_seconds must be greater than 0".to_string()));
        }
        let patterns = PatternSet::new(self.patterns)?;

        if let Err(e) = self.store.ping().await {
            error!(error = %e, patterns = ?patterns.patterns(), "Counter store health check failed");
            return Err(ClientError::StoreUnavailable { message: e.to_string() });
        }

        // Empty values fall back to the defaults so keys line up with other clients of the store
        let label = self.label.filter(|l| !l.is_empty()).unwrap_or_else(|| patterns.label());
        let key_prefix = self.key_prefix.filter(|p| !p.is_empty()).unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());

        info!(label = %label, key_prefix = %key_prefix, window_seconds = self.window_seconds, max_safe_count = self.max_safe_count, "URL pattern rate limiter ready");

        Ok(UrlPatternRateLimiter {
            store: self.store,
            patterns,
            window_seconds: self.window_seconds,
            max_safe_count: self.max_safe_count,
            label,
            key_prefix,
            clock: self.clock,
            last_known_count: AtomicU64::new(0),
            limit_exceeded: AtomicBool::new(false),
        })
    }
}
