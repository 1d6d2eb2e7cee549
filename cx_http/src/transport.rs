use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Instant;

use cx_types::ClientError;
use cx_types::HttpMethod;
use cx_types::IoOrigin;
use cx_types::RequestContext;
use cx_types::ResponseContext;
use cx_types::Result;
use reqwest::Client;
use reqwest::ClientBuilder;
use reqwest::Method;
use tracing::debug;
use tracing::info;

use crate::config::TransportConfig;

/// Performs the network I/O for a request
///
/// May be shared by many executors; whoever created it decides when to close it.
pub trait Transport: Send + Sync {
    fn call<'a>(&'a self, request: &'a RequestContext) -> Pin<Box<dyn Future<Output = Result<ResponseContext>> + Send + 'a>>;

    /// Release pooled connections; calls afterwards fail with `Closed`
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

/// reqwest-backed transport with a pooled, rustls-only client
pub struct ReqwestTransport {
    client: RwLock<Option<Client>>,
    config: TransportConfig,
    closed: AtomicBool,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            // Connection pooling
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            // TCP
            .tcp_nodelay(config.tcp_nodelay)
            .tcp_keepalive(Some(config.tcp_keepalive))
            // Timeouts
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .user_agent(config.user_agent.as_str())
            .gzip(true)
            .brotli(true)
            .hickory_dns(config.hickory_dns);

        if config.http2 {
            builder = builder
                .http2_adaptive_window(config.http2_adaptive_window)
                .http2_keep_alive_interval(Some(config.http2_keep_alive_interval))
                .http2_keep_alive_timeout(config.http2_keep_alive_timeout);
            if config.http2_prior_knowledge {
                builder = builder.http2_prior_knowledge();
            }
        } else {
            builder = builder.http1_only();
        }

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str()).map_err(|e| ClientError::InvalidConfig(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        } else if !config.trust_env {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(|e| ClientError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        debug!(pool = config.pool_max_idle_per_host, timeout = ?config.request_timeout, http2 = config.http2, "Built reqwest transport");

        Ok(Self { client: RwLock::new(Some(client)), config, closed: AtomicBool::new(false) })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn client(&self) -> Result<Client> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        self.client.read().ok().and_then(|guard| guard.clone()).ok_or(ClientError::Closed)
    }

    async fn execute(&self, request: &RequestContext) -> Result<ResponseContext> {
        let client = self.client()?;

        let mut builder = client.request(method(request.method()), request.url().clone());
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_string());
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        let final_url = response.url().to_string();
        let mut context = ResponseContext::new(status.as_u16(), request).with_final_url(final_url);
        if let Some(reason) = status.canonical_reason() {
            context = context.with_reason(reason);
        }
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                context = context.with_header(name.as_str(), value);
            }
        }

        let body = response.bytes().await.map_err(transport_error)?;
        Ok(context.with_body(body).with_elapsed(started.elapsed()))
    }
}

impl Transport for ReqwestTransport {
    fn call<'a>(&'a self, request: &'a RequestContext) -> Pin<Box<dyn Future<Output = Result<ResponseContext>> + Send + 'a>> {
        Box::pin(self.execute(request))
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            // Dropping the last client handle tears down the pool
            if let Ok(mut guard) = self.client.write() {
                guard.take();
            }
            info!("Closed reqwest transport");
        })
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Connect and timeout failures are transient, the rest are not
fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout { origin: IoOrigin::Transport, message: err.to_string() }
    } else if err.is_connect() {
        ClientError::Connect { origin: IoOrigin::Transport, message: err.to_string() }
    } else {
        ClientError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cx_types::ErrorKind;

    use super::*;

    #[test]
    fn test_transport_creation() {
        assert!(ReqwestTransport::new().is_ok());
        assert!(ReqwestTransport::with_config(TransportConfig::low_latency()).is_ok());
        assert!(ReqwestTransport::with_config(TransportConfig::high_throughput()).is_ok());
        assert!(ReqwestTransport::with_config(TransportConfig { http2: false, ..Default::default() }).is_ok());
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let config = TransportConfig { proxy: Some("::not a proxy::".to_string()), ..Default::default() };
        let err = ReqwestTransport::with_config(config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn test_closed_transport_refuses_calls() {
        let transport = ReqwestTransport::new().unwrap();
        transport.close().await;
        transport.close().await;
        assert!(transport.is_closed());

        let request = RequestContext::parse(HttpMethod::Get, "http://127.0.0.1:1/").unwrap();
        let err = transport.call(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
    }

    #[tokio::test]
    async fn test_refused_connection_is_transient() {
        let config = TransportConfig { connect_timeout: Duration::from_secs(2), hickory_dns: false, ..Default::default() };
        let transport = ReqwestTransport::with_config(config).unwrap();

        // Nothing listens on port 1
        let request = RequestContext::parse(HttpMethod::Get, "http://127.0.0.1:1/v1/ticker").unwrap();
        let err = transport.call(&request).await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }
}
