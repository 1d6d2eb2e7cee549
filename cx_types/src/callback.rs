use futures::future::BoxFuture;

use crate::error::Result;
use crate::request::RequestContext;
use crate::response::ResponseContext;

/// Hook invoked around every transport call made by an executor.
///
/// `before_request` may abort the call by returning an error; no network I/O happens then.
/// `after_request` sees every response the transport produced, successful status or not,
/// and may turn it into an error (response validators do this).
pub trait RequestCallback: Send + Sync {
    /// Name used in logs and in `CallbackAborted` errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn before_request<'a>(&'a self, request: &'a RequestContext) -> BoxFuture<'a, Result<()>>;

    fn after_request<'a>(&'a self, response: &'a ResponseContext) -> BoxFuture<'a, Result<()>>;
}
