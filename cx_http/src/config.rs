use std::collections::BTreeSet;
use std::time::Duration;

use cx_types::ClientError;
use cx_types::ErrorKind;
use serde::Deserialize;
use serde::Serialize;

use crate::retry::RetryPolicy;

/// Durations written as (fractional) seconds in config files
mod secs {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Retry options as they appear in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub backoff_factor: f64,
    pub jitter: bool,
    pub retryable_error_kinds: BTreeSet<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_seconds: 1.0,
            max_delay_seconds: 60.0,
            backoff_factor: 2.0,
            jitter: true,
            retryable_error_kinds: BTreeSet::from([ErrorKind::Connect, ErrorKind::Timeout]),
        }
    }
}

impl TryFrom<RetryConfig> for RetryPolicy {
    type Error = ClientError;

    fn try_from(config: RetryConfig) -> Result<Self, Self::Error> {
        let initial_delay = Duration::try_from_secs_f64(config.initial_delay_seconds)
            .map_err(|e| ClientError::InvalidConfig(format!("initial_delay_seconds {}: {e}", config.initial_delay_seconds)))?;
        let max_delay = Duration::try_from_secs_f64(config.max_delay_seconds)
            .map_err(|e| ClientError::InvalidConfig(format!("max_delay_seconds {}: {e}", config.max_delay_seconds)))?;

        Ok(RetryPolicy::new(config.max_retries, initial_delay, max_delay, config.backoff_factor)?
            .with_jitter(config.jitter)
            .with_retryable(config.retryable_error_kinds))
    }
}

/// Connection pool and timeout settings for the reqwest transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum idle connections per host (default: 100)
    pub pool_max_idle_per_host: usize,

    /// Idle pooled connections are dropped after this long (default: 30s)
    #[serde(with = "secs")]
    pub pool_idle_timeout: Duration,

    /// Connection establishment timeout (default: 5s)
    #[serde(with = "secs")]
    pub connect_timeout: Duration,

    /// Per-attempt request timeout, connect through body (default: 10s)
    #[serde(with = "secs")]
    pub request_timeout: Duration,

    /// TCP keepalive interval (default: 30s)
    #[serde(with = "secs")]
    pub tcp_keepalive: Duration,

    pub tcp_nodelay: bool,

    /// Offer HTTP/2 via ALPN (default: true)
    pub http2: bool,

    /// Skip ALPN and speak HTTP/2 directly (default: false)
    pub http2_prior_knowledge: bool,

    pub http2_adaptive_window: bool,

    #[serde(with = "secs")]
    pub http2_keep_alive_interval: Duration,

    #[serde(with = "secs")]
    pub http2_keep_alive_timeout: Duration,

    /// Hickory DNS for async resolution (default: true)
    pub hickory_dns: bool,

    pub user_agent: String,

    /// Route every request through this proxy
    pub proxy: Option<String>,

    /// Honour HTTP(S)_PROXY style environment variables (default: false)
    pub trust_env: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 100,
            pool_idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            tcp_keepalive: Duration::from_secs(30),
            tcp_nodelay: true,
            http2: true,
            http2_prior_knowledge: false,
            http2_adaptive_window: true,
            http2_keep_alive_interval: Duration::from_secs(30),
            http2_keep_alive_timeout: Duration::from_secs(20),
            hickory_dns: true,
            user_agent: "crypto-api-client/1.0".to_string(),
            proxy: None,
            trust_env: false,
        }
    }
}

impl TransportConfig {
    /// Shorter timeouts, smaller pool.
    pub fn low_latency() -> Self {
        Self {
            pool_max_idle_per_host: 10,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            http2_keep_alive_interval: Duration::from_secs(20),
            http2_keep_alive_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Larger pool kept warm for longer.
    pub fn high_throughput() -> Self {
        Self { pool_max_idle_per_host: 200, pool_idle_timeout: Duration::from_secs(120), request_timeout: Duration::from_secs(30), ..Default::default() }
    }
}
