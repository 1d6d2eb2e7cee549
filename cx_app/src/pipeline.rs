use std::sync::Arc;
use std::time::Duration;

use cx_http::LoggingCallback;
use cx_http::RequestExecutor;
use cx_http::RequestExecutorBuilder;
use cx_http::RetryPolicy;
use cx_ratelimit::RedisCounterStore;
use cx_ratelimit::SharedCounterStore;
use cx_ratelimit::UrlPatternRateLimiter;
use cx_types::RequestCallback;
use cx_types::RequestContext;
use cx_types::ResponseContext;
use cx_types::Result;
use tracing::info;

use crate::config_loader::ClientConfigFile;

const STORE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An executor assembled from configuration, plus handles on its rate limiters
#[derive(Debug)]
pub struct ClientPipeline {
    executor: RequestExecutor,
    limiters: Vec<Arc<UrlPatternRateLimiter>>,
    deadline: Option<Duration>,
}

impl ClientPipeline {
    /// Send under the configured deadline, if any
    pub async fn send(&self, request: &RequestContext) -> Result<ResponseContext> {
        match self.deadline {
            Some(deadline) => self.executor.send_with_deadline(request, deadline).await,
            None => self.executor.send(request).await,
        }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn limiters(&self) -> &[Arc<UrlPatternRateLimiter>] {
        &self.limiters
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
    }
}

/// Connect to the counter store named in the config
pub async fn connect_store(config: &ClientConfigFile) -> Result<Arc<RedisCounterStore>> {
    Ok(Arc::new(RedisCounterStore::connect(&config.redis_url, STORE_CONNECT_TIMEOUT).await?))
}

/// Health-check one limiter per `[[rate_limits]]` entry
pub async fn build_limiters(config: &ClientConfigFile, store: Arc<dyn SharedCounterStore>) -> Result<Vec<Arc<UrlPatternRateLimiter>>> {
    let mut limiters = Vec::with_capacity(config.rate_limits.len());
    for limit in &config.rate_limits {
        let limiter = UrlPatternRateLimiter::from_config(store.clone(), limit).await?;
        info!(limiter = %limiter, "Registered rate limiter");
        limiters.push(Arc::new(limiter));
    }
    Ok(limiters)
}

/// Builder with logging, the configured limiters, retry policy and transport settings
///
/// Append response validators to the returned builder before building.
pub async fn executor_builder(config: &ClientConfigFile, store: Arc<dyn SharedCounterStore>) -> Result<(RequestExecutorBuilder, Vec<Arc<UrlPatternRateLimiter>>)> {
    let limiters = build_limiters(config, store).await?;
    let policy = RetryPolicy::try_from(config.retry.clone())?;

    let builder = RequestExecutor::builder()
        .transport_config(config.transport.clone())
        .callback(Arc::new(LoggingCallback::new()))
        .callbacks(limiters.iter().map(|l| l.clone() as Arc<dyn RequestCallback>))
        .retry_policy(policy);

    Ok((builder, limiters))
}

/// Assemble the full pipeline described by `config`
pub async fn build_executor(config: &ClientConfigFile, store: Arc<dyn SharedCounterStore>) -> Result<ClientPipeline> {
    let (builder, limiters) = executor_builder(config, store).await?;
    let executor = builder.build()?;
    info!(callbacks = ?executor.callbacks(), deadline = ?config.deadline(), "Client pipeline ready");
    Ok(ClientPipeline { executor, limiters, deadline: config.deadline() })
}

#[cfg(test)]
mod tests {
    use cx_ratelimit::MemoryCounterStore;
    use cx_ratelimit::RateLimitConfig;
    use cx_types::ErrorKind;

    use crate::config_loader::load_client_config_from_str;
    use super::*;

    fn config_with_limits() -> ClientConfigFile {
        ClientConfigFile {
            request_timeout_seconds: Some(15.0),
            rate_limits: vec![
                RateLimitConfig::new(["/v1/me/sendchildorder"]).with_max_safe_count(250),
                RateLimitConfig::new(["/v1/ticker"]).with_window_seconds(60).with_max_safe_count(2).with_label("ticker"),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_pipeline_from_config() {
        let store = Arc::new(MemoryCounterStore::new());
        let pipeline = build_executor(&config_with_limits(), store.clone()).await.unwrap();

        assert_eq!(pipeline.limiters().len(), 2);
        assert_eq!(pipeline.limiters()[1].label(), "ticker");
        assert_eq!(pipeline.executor().callbacks().names(), vec!["logging", "url_pattern_rate_limiter", "url_pattern_rate_limiter"]);
        assert_eq!(pipeline.executor().retry_policy(), Some(&RetryPolicy::default()));
        assert!(pipeline.executor().owns_transport());
        assert_eq!(pipeline.deadline(), Some(Duration::from_secs(15)));
        // one health check per limiter
        assert_eq!(store.ping_calls(), 2);

        pipeline.shutdown().await;
        assert!(pipeline.executor().is_closed());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_assembly() {
        let store = Arc::new(MemoryCounterStore::new());
        store.set_unreachable(true);

        let err = build_executor(&config_with_limits(), store).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_invalid_retry_section_rejected() {
        let config = load_client_config_from_str("[retry]\nbackoff_factor = 0.5\n").unwrap();
        let err = build_executor(&config, Arc::new(MemoryCounterStore::new())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn test_no_limits_means_no_store_traffic() {
        let store = Arc::new(MemoryCounterStore::new());
        let pipeline = build_executor(&ClientConfigFile::default(), store.clone()).await.unwrap();

        assert!(pipeline.limiters().is_empty());
        assert_eq!(store.total_calls(), 0);
    }
}
