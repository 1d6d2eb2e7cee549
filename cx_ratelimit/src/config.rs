use serde::Deserialize;
use serde::Serialize;

/// Default fixed-window length in seconds
pub const DEFAULT_WINDOW_SECONDS: u64 = 300;

/// Default number of attempts admitted per window
pub const DEFAULT_MAX_SAFE_COUNT: u64 = 200;

fn default_window_seconds() -> u64 {
    DEFAULT_WINDOW_SECONDS
}

fn default_max_safe_count() -> u64 {
    DEFAULT_MAX_SAFE_COUNT
}

/// Recognised options for one URL-pattern rate limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub url_patterns: Vec<String>,

    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    #[serde(default = "default_max_safe_count")]
    pub max_safe_count: u64,

    /// Explicit counter label; derived from the patterns when absent
    #[serde(default)]
    pub label: Option<String>,

    /// Key prefix; `RATE_LIMIT:URL_PATTERN` when absent
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl RateLimitConfig {
    pub fn new<I, S>(url_patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url_patterns: url_patterns.into_iter().map(Into::into).collect(),
            window_seconds: DEFAULT_WINDOW_SECONDS,
            max_safe_count: DEFAULT_MAX_SAFE_COUNT,
            label: None,
            key_prefix: None,
        }
    }

    pub fn with_window_seconds(mut self, window_seconds: u64) -> Self {
        self.window_seconds = window_seconds;
        self
    }

    pub fn with_max_safe_count(mut self, max_safe_count: u64) -> Self {
        self.max_safe_count = max_safe_count;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(key_prefix.into());
        self
    }
}
