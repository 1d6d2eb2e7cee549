use std::fmt;

use url::Url;

use crate::error::ClientError;
use crate::error::Result;
use crate::headers::SecretHeaders;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound call attempt: method, URL, headers and optional body.
///
/// Built once and never mutated; callbacks and the transport only borrow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    method: HttpMethod,
    url: Url,
    headers: SecretHeaders,
    body: Option<String>,
}

impl RequestContext {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self { method, url, headers: SecretHeaders::new(), body: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: Url, body: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url).with_body(body)
    }

    /// Parse `url` and build a request for it
    pub fn parse(method: HttpMethod, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|err| ClientError::InvalidRequest(format!("{url}: {err}")))?;
        Ok(Self::new(method, url))
    }

    /// Join `base`, an optional version stub such as `/v1` and a resource path, then append query params.
    pub fn endpoint(method: HttpMethod, base: &Url, stub: Option<&str>, resource: &str, params: &[(&str, &str)]) -> Result<Self> {
        let mut path = String::new();
        if let Some(stub) = stub {
            path.push('/');
            path.push_str(stub.trim_matches('/'));
        }
        path.push('/');
        path.push_str(resource.trim_start_matches('/'));

        let mut url = base.clone();
        url.set_path(&path);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }

        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidRequest(format!("{base} cannot carry a path")));
        }

        Ok(Self::new(method, url))
    }

    pub fn with_headers(mut self, headers: SecretHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Path component of the URL, which is what URL-pattern limiters match against
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn headers(&self) -> &SecretHeaders {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}
