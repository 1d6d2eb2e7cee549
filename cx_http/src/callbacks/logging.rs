use cx_types::RequestCallback;
use cx_types::RequestContext;
use cx_types::ResponseContext;
use cx_types::Result;
use futures::future::BoxFuture;
use tracing::info;

/// Logs every request and response; secret header values are masked
#[derive(Debug, Clone, Default)]
pub struct LoggingCallback {
    log_bodies: bool,
}

impl LoggingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log request bodies (never response bodies)
    pub fn with_bodies(mut self, log_bodies: bool) -> Self {
        self.log_bodies = log_bodies;
        self
    }
}

impl RequestCallback for LoggingCallback {
    fn name(&self) -> &str {
        "logging"
    }

    fn before_request<'a>(&'a self, request: &'a RequestContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.log_bodies {
                info!(method = %request.method(), url = %request.url(), headers = %request.headers(), body = request.body().unwrap_or(""), "Sending request");
            } else {
                info!(method = %request.method(), url = %request.url(), headers = %request.headers(), "Sending request");
            }
            Ok(())
        })
    }

    fn after_request<'a>(&'a self, response: &'a ResponseContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!(
                method = %response.request_method(),
                path = response.request_path(),
                status = response.status_code(),
                reason = response.reason(),
                elapsed_ms = response.elapsed().as_millis() as u64,
                bytes = response.body().len(),
                "Received response"
            );
            Ok(())
        })
    }
}
