use std::collections::BTreeSet;

use cx_types::ClientError;
use cx_types::RequestCallback;
use cx_types::RequestContext;
use cx_types::ResponseContext;
use cx_types::Result;
use futures::future::BoxFuture;

/// Turns unwanted statuses into `Permanent` errors after the response arrives
///
/// By default every non-2xx status is rejected; [`StatusValidator::only`] narrows that to an
/// explicit set. Register it after a rate limiter so the attempt is counted first.
#[derive(Debug, Clone, Default)]
pub struct StatusValidator {
    rejected: Option<BTreeSet<u16>>,
}

impl StatusValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject only these statuses
    pub fn only<I: IntoIterator<Item = u16>>(statuses: I) -> Self {
        Self { rejected: Some(statuses.into_iter().collect()) }
    }

    fn rejects(&self, status: u16) -> bool {
        match &self.rejected {
            Some(statuses) => statuses.contains(&status),
            None => !cx_types::status::is_success(status),
        }
    }

    pub fn validate(&self, response: &ResponseContext) -> Result<()> {
        if !self.rejects(response.status_code()) {
            return Ok(());
        }
        Err(ClientError::Permanent {
            message: format!("{} {} returned {} {}", response.request_method(), response.request_path(), response.status_code(), response.reason()),
            status_code: Some(response.status_code()),
            response_body: Some(response.text()),
        })
    }
}

impl RequestCallback for StatusValidator {
    fn name(&self) -> &str {
        "status_validator"
    }

    fn before_request<'a>(&'a self, _request: &'a RequestContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn after_request<'a>(&'a self, response: &'a ResponseContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.validate(response) })
    }
}

/// Response validator from any closure, for venue-specific error envelopes
pub struct FnValidator<F> {
    name: String,
    check: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&ResponseContext) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self { name: name.into(), check }
    }
}

impl<F> RequestCallback for FnValidator<F>
where
    F: Fn(&ResponseContext) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn before_request<'a>(&'a self, _request: &'a RequestContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn after_request<'a>(&'a self, response: &'a ResponseContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { (self.check)(response) })
    }
}
