use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use cx_types::ClientError;
use cx_types::RequestCallback;
use cx_types::RequestContext;
use cx_types::ResponseContext;
use cx_types::Result;
use tracing::debug;
use tracing::info;

use crate::callback_chain::CallbackChain;
use crate::config::TransportConfig;
use crate::retry::RetryPolicy;
use crate::retry::RetryStrategy;
use crate::transport::ReqwestTransport;
use crate::transport::Transport;

/// Runs one logical call through the callback chain and the transport
///
/// Per attempt: before-hooks, transport call, after-hooks, all in registration order. With a
/// retry policy the whole attempt is repeated on retryable failures.
///
/// A transport passed to the builder is only borrowed and never closed here. When the
/// builder creates the transport itself, [`RequestExecutor::shutdown`] closes it.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    owns_transport: bool,
    callbacks: CallbackChain,
    retry: Option<RetryStrategy>,
    closed: AtomicBool,
}

impl RequestExecutor {
    pub fn builder() -> RequestExecutorBuilder {
        RequestExecutorBuilder::new()
    }

    pub fn callbacks(&self) -> &CallbackChain {
        &self.callbacks
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref().map(RetryStrategy::policy)
    }

    pub fn owns_transport(&self) -> bool {
        self.owns_transport
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// One attempt, no retries
    ///
    /// A before-hook failure returns `CallbackAborted` and the transport is not called.
    pub async fn send_once(&self, request: &RequestContext) -> Result<ResponseContext> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        self.callbacks.run_before(request).await?;
        let response = self.transport.call(request).await?;
        debug!(method = %request.method(), path = request.path(), status = response.status_code(), elapsed = ?response.elapsed(), "Transport call finished");
        self.callbacks.run_after(&response).await?;
        Ok(response)
    }

    /// Send with the configured retry policy, if any
    pub async fn send(&self, request: &RequestContext) -> Result<ResponseContext> {
        match &self.retry {
            Some(retry) => retry.execute(|| self.send_once(request)).await,
            None => self.send_once(request).await,
        }
    }

    /// [`send`](Self::send) bounded by an overall deadline covering every attempt and backoff
    ///
    /// Store increments already made by finished attempts stay recorded when the deadline hits.
    pub async fn send_with_deadline(&self, request: &RequestContext, deadline: Duration) -> Result<ResponseContext> {
        tokio::time::timeout(deadline, self.send(request)).await.map_err(|_| ClientError::DeadlineElapsed(deadline))?
    }

    /// Stop accepting requests; closes the transport only if this executor created it
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.owns_transport {
            self.transport.close().await;
        }
        info!(owned_transport = self.owns_transport, "Request executor shut down");
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("callbacks", &self.callbacks)
            .field("retry", &self.retry_policy())
            .field("owns_transport", &self.owns_transport)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for [`RequestExecutor`]; callbacks can only be registered here
#[derive(Default)]
pub struct RequestExecutorBuilder {
    transport: Option<Arc<dyn Transport>>,
    transport_config: TransportConfig,
    callbacks: Vec<Arc<dyn RequestCallback>>,
    retry_policy: Option<RetryPolicy>,
}

impl RequestExecutorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a shared transport; the executor will never close it
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Settings for the transport created when none is injected
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    pub fn callback(mut self, callback: Arc<dyn RequestCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn callbacks<I: IntoIterator<Item = Arc<dyn RequestCallback>>>(mut self, callbacks: I) -> Self {
        self.callbacks.extend(callbacks);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<RequestExecutor> {
        let (transport, owns_transport): (Arc<dyn Transport>, bool) = match self.transport {
            Some(transport) => (transport, false),
            None => (Arc::new(ReqwestTransport::with_config(self.transport_config)?), true),
        };

        let callbacks = CallbackChain::new(self.callbacks);
        debug!(callbacks = ?callbacks, owns_transport, retry = self.retry_policy.is_some(), "Built request executor");

        Ok(RequestExecutor { transport, owns_transport, callbacks, retry: self.retry_policy.map(RetryStrategy::new), closed: AtomicBool::new(false) })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use cx_ratelimit::MemoryCounterStore;
    use cx_ratelimit::UrlPatternRateLimiter;
    use cx_types::ErrorKind;
    use cx_types::HttpMethod;
    use cx_types::IoOrigin;
    use futures::future::BoxFuture;

    use crate::callbacks::StatusValidator;
    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Replays scripted outcomes; an empty script answers 200
    struct ScriptedTransport {
        script: Mutex<VecDeque<std::result::Result<u16, ErrorKind>>>,
        calls: AtomicUsize,
        closes: AtomicUsize,
        delay: Duration,
        log: Log,
    }

    impl ScriptedTransport {
        fn new(script: Vec<std::result::Result<u16, ErrorKind>>, log: &Log) -> Self {
            Self { script: Mutex::new(script.into()), calls: AtomicUsize::new(0), closes: AtomicUsize::new(0), delay: Duration::ZERO, log: log.clone() }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for ScriptedTransport {
        fn call<'a>(&'a self, request: &'a RequestContext) -> Pin<Box<dyn Future<Output = Result<ResponseContext>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.log.lock().unwrap().push("transport".to_string());
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(200));
                match next {
                    Ok(status) => Ok(ResponseContext::new(status, request)),
                    Err(ErrorKind::Timeout) => Err(ClientError::Timeout { origin: IoOrigin::Transport, message: "scripted".to_string() }),
                    Err(_) => Err(ClientError::Connect { origin: IoOrigin::Transport, message: "scripted".to_string() }),
                }
            })
        }

        fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                self.closes.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    struct Tracer {
        name: &'static str,
        log: Log,
    }

    impl RequestCallback for Tracer {
        fn name(&self) -> &str {
            self.name
        }

        fn before_request<'a>(&'a self, _request: &'a RequestContext) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("before:{}", self.name));
                Ok(())
            })
        }

        fn after_request<'a>(&'a self, _response: &'a ResponseContext) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("after:{}", self.name));
                Ok(())
            })
        }
    }

    fn ticker() -> RequestContext {
        RequestContext::parse(HttpMethod::Get, "https://api.example.com/v1/ticker").unwrap()
    }

    fn fast_retries(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(100), Duration::from_secs(1), 2.0).unwrap().with_jitter(false)
    }

    async fn ticker_limiter(store: &Arc<MemoryCounterStore>, max_safe_count: u64) -> Arc<UrlPatternRateLimiter> {
        Arc::new(UrlPatternRateLimiter::builder(store.clone()).pattern("/v1/ticker").window_seconds(60).max_safe_count(max_safe_count).build().await.unwrap())
    }

    #[tokio::test]
    async fn test_hooks_wrap_transport_in_order() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(ScriptedTransport::new(vec![], &log));
        let executor = RequestExecutor::builder()
            .transport(transport.clone())
            .callback(Arc::new(Tracer { name: "first", log: log.clone() }))
            .callback(Arc::new(Tracer { name: "second", log: log.clone() }))
            .build()
            .unwrap();

        let response = executor.send(&ticker()).await.unwrap();

        assert_eq!(response.status_code(), 200);
        assert_eq!(*log.lock().unwrap(), vec!["before:first", "before:second", "transport", "after:first", "after:second"]);
        assert!(!executor.owns_transport());
    }

    #[tokio::test]
    async fn test_rejected_admission_skips_transport() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryCounterStore::new());
        let transport = Arc::new(ScriptedTransport::new(vec![], &log));
        let executor = RequestExecutor::builder().transport(transport.clone()).callback(ticker_limiter(&store, 1).await).retry_policy(fast_retries(3)).build().unwrap();

        executor.send(&ticker()).await.unwrap();
        let err = executor.send(&ticker()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CallbackAborted);
        assert_eq!(err.root_cause().kind(), ErrorKind::AdmissionRejected);
        assert!(err.to_string().contains("url_pattern_rate_limiter"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_validator_failure_keeps_counter_increment() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryCounterStore::new());
        let limiter = ticker_limiter(&store, 10).await;
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(500)], &log));
        let executor = RequestExecutor::builder().transport(transport).callback(limiter.clone()).callback(Arc::new(StatusValidator::new())).build().unwrap();

        let err = executor.send(&ticker()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert_eq!(limiter.count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_and_counted() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryCounterStore::new());
        let limiter = ticker_limiter(&store, 10).await;
        let transport = Arc::new(ScriptedTransport::new(vec![Err(ErrorKind::Timeout), Err(ErrorKind::Connect), Ok(200)], &log));
        let executor = RequestExecutor::builder().transport(transport.clone()).callback(limiter.clone()).retry_policy(fast_retries(5)).build().unwrap();

        let response = executor.send(&ticker()).await.unwrap();

        assert_eq!(response.status_code(), 200);
        assert_eq!(transport.calls(), 3);
        // Failed attempts never produced a response, so only the last one is recorded
        assert_eq!(limiter.count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_through_executor() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(ScriptedTransport::new(vec![Err(ErrorKind::Timeout); 10], &log));
        let executor = RequestExecutor::builder().transport(transport.clone()).retry_policy(fast_retries(3)).build().unwrap();

        let err = executor.send(&ticker()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RetryExhausted);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_covers_retries() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(ScriptedTransport::new(vec![Err(ErrorKind::Timeout); 10], &log));
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(60), 2.0).unwrap().with_jitter(false);
        let executor = RequestExecutor::builder().transport(transport.clone()).retry_policy(policy).build().unwrap();

        let err = executor.send_with_deadline(&ticker(), Duration::from_millis(2500)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeadlineElapsed);
        // attempts at 0s and 1s, third would start at 3s
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_transport_hits_deadline() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut scripted = ScriptedTransport::new(vec![], &log);
        scripted.delay = Duration::from_secs(30);
        let executor = RequestExecutor::builder().transport(Arc::new(scripted)).build().unwrap();

        let err = executor.send_with_deadline(&ticker(), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, ClientError::DeadlineElapsed(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_injected_transport_is_never_closed() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let transport = Arc::new(ScriptedTransport::new(vec![], &log));
        let first = RequestExecutor::builder().transport(transport.clone()).build().unwrap();
        let second = RequestExecutor::builder().transport(transport.clone()).build().unwrap();

        first.shutdown().await;
        assert_eq!(transport.closes.load(Ordering::SeqCst), 0);
        assert_eq!(first.send(&ticker()).await.unwrap_err().kind(), ErrorKind::Closed);

        // The shared transport keeps serving other executors
        second.send(&ticker()).await.unwrap();
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_owned_transport_closed_once_on_shutdown() {
        let executor = RequestExecutor::builder().transport_config(TransportConfig::low_latency()).build().unwrap();
        assert!(executor.owns_transport());

        executor.shutdown().await;
        executor.shutdown().await;

        assert!(executor.is_closed());
        assert_eq!(executor.send(&ticker()).await.unwrap_err().kind(), ErrorKind::Closed);
    }
}
