use std::sync::Arc;

use cx_types::ClientError;
use cx_types::RequestCallback;
use cx_types::RequestContext;
use cx_types::ResponseContext;
use cx_types::Result;
use tracing::debug;
use tracing::warn;

/// Ordered callbacks owned by one executor
///
/// Fixed once built: there is no way to add or remove a callback while requests are in
/// flight. Both phases walk the callbacks in registration order.
#[derive(Clone, Default)]
pub struct CallbackChain {
    callbacks: Vec<Arc<dyn RequestCallback>>,
}

impl CallbackChain {
    pub fn new(callbacks: Vec<Arc<dyn RequestCallback>>) -> Self {
        Self { callbacks }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RequestCallback>> {
        self.callbacks.iter()
    }

    /// Run every before-hook; the first failure stops the chain as `CallbackAborted`
    pub async fn run_before(&self, request: &RequestContext) -> Result<()> {
        for callback in &self.callbacks {
            if let Err(e) = callback.before_request(request).await {
                warn!(callback = callback.name(), path = request.path(), error = %e, "Request aborted by callback");
                return Err(ClientError::CallbackAborted { callback: callback.name().to_string(), source: Box::new(e) });
            }
        }
        debug!(callbacks = self.callbacks.len(), path = request.path(), "Before hooks passed");
        Ok(())
    }

    /// Run every after-hook; the first failure is returned as-is
    ///
    /// Side effects of hooks that already ran (a counter increment, say) stay applied.
    pub async fn run_after(&self, response: &ResponseContext) -> Result<()> {
        for callback in &self.callbacks {
            if let Err(e) = callback.after_request(response).await {
                debug!(callback = callback.name(), status = response.status_code(), error = %e, "After hook failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for CallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl FromIterator<Arc<dyn RequestCallback>> for CallbackChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn RequestCallback>>>(iter: I) -> Self {
        Self { callbacks: iter.into_iter().collect() }
    }
}
