//! # cx_types
//!
//! Shared vocabulary of the request pipeline: errors, request and response contexts,
//! secret-masking headers and the callback trait.

pub mod callback;
pub mod error;
pub mod headers;
pub mod request;
pub mod response;
pub mod status;

pub use callback::RequestCallback;
pub use error::ClientError;
pub use error::ErrorKind;
pub use error::IoOrigin;
pub use error::Result;
pub use error::RetrySummary;
pub use headers::SecretHeaders;
pub use request::HttpMethod;
pub use request::RequestContext;
pub use response::ResponseContext;
