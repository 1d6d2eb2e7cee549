use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;

use crate::request::HttpMethod;
use crate::request::RequestContext;
use crate::status;

/// What came back from one transport call, plus where it was sent.
///
/// Header names are stored lowercased. Status codes stay raw so non-standard codes survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseContext {
    status_code: u16,
    reason: Option<String>,
    headers: BTreeMap<String, String>,
    body: Bytes,
    elapsed: Duration,
    url: String,
    request_method: HttpMethod,
    request_url: String,
    request_path: String,
}

impl ResponseContext {
    /// Start a response for `request`; the final URL defaults to the request URL.
    pub fn new(status_code: u16, request: &RequestContext) -> Self {
        Self {
            status_code,
            reason: None,
            headers: BTreeMap::new(),
            body: Bytes::new(),
            elapsed: Duration::ZERO,
            url: request.url().to_string(),
            request_method: request.method(),
            request_url: request.url().to_string(),
            request_path: request.path().to_string(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Final URL after the transport followed any redirects
    pub fn with_final_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or_else(|| status::reason_phrase(self.status_code))
    }

    pub fn is_success(&self) -> bool {
        status::is_success(self.status_code)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request_method(&self) -> HttpMethod {
        self.request_method
    }

    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    pub fn request_path(&self) -> &str {
        &self.request_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_records_origin() {
        let request = RequestContext::parse(HttpMethod::Get, "https://api.example.com/v1/ticker?pair=btc_jpy").unwrap();
        let response = ResponseContext::new(200, &request)
            .with_header("X-RateLimit-Remaining", "99")
            .with_body(r#"{"last":1}"#)
            .with_elapsed(Duration::from_millis(12));

        assert_eq!(response.request_path(), "/v1/ticker");
        assert_eq!(response.request_url(), "https://api.example.com/v1/ticker?pair=btc_jpy");
        assert_eq!(response.request_method(), HttpMethod::Get);
        assert_eq!(response.header("x-ratelimit-remaining"), Some("99"));
        assert_eq!(response.text(), r#"{"last":1}"#);
        assert_eq!(response.elapsed(), Duration::from_millis(12));
        assert!(response.is_success());
    }

    #[test]
    fn test_nonstandard_status_kept_raw() {
        let request = RequestContext::parse(HttpMethod::Get, "https://api.example.com/").unwrap();
        let response = ResponseContext::new(522, &request);

        assert_eq!(response.status_code(), 522);
        assert_eq!(response.reason(), "Connection Timed Out");
        assert!(!response.is_success());
    }
}
