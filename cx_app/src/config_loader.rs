use std::path::Path;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use config::FileFormat;
use cx_http::RetryConfig;
use cx_http::TransportConfig;
use cx_ratelimit::RateLimitConfig;
use serde::Deserialize;
use serde::Serialize;

use crate::tracing_setup::LoggingConfig;

/// Environment overrides look like `CX__RETRY__MAX_RETRIES=3`
pub const ENV_PREFIX: &str = "CX";

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";

/// Everything needed to assemble a request pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigFile {
    pub redis_url: String,

    /// Overall deadline per logical call, retries included
    pub request_timeout_seconds: Option<f64>,

    pub retry: RetryConfig,
    pub transport: TransportConfig,
    pub rate_limits: Vec<RateLimitConfig>,
    pub logging: LoggingConfig,
}

impl Default for ClientConfigFile {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            request_timeout_seconds: None,
            retry: RetryConfig::default(),
            transport: TransportConfig::default(),
            rate_limits: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfigFile {
    pub fn deadline(&self) -> Option<Duration> {
        self.request_timeout_seconds.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__").try_parsing(true)
}

/// Load from a TOML/YAML/JSON file (format by extension) with `CX__` environment overrides
pub fn load_client_config<P: AsRef<Path>>(path: P) -> Result<ClientConfigFile, ConfigError> {
    let config = Config::builder().add_source(File::from(path.as_ref())).add_source(environment()).build()?;

    config.try_deserialize()
}

/// Load from an in-memory TOML document, without environment overrides
pub fn load_client_config_from_str(toml: &str) -> Result<ClientConfigFile, ConfigError> {
    let config = Config::builder().add_source(File::from_str(toml, FileFormat::Toml)).build()?;

    config.try_deserialize()
}

/// Load client config with fallback to default
pub fn load_client_config_or_default(path: &str) -> ClientConfigFile {
    match load_client_config(path) {
        Ok(config) => {
            tracing::info!("Loaded client config from {path}");
            config
        }
        Err(err) => {
            tracing::warn!("Failed to load client config from {}: {}. Using defaults.", path, err);
            ClientConfigFile::default()
        }
    }
}
