//! # cx_http
//!
//! Resilient request execution: a [`RequestExecutor`] runs each call through an ordered
//! [`CallbackChain`], an injected or owned [`Transport`], and optionally a
//! [`RetryStrategy`] with exponential backoff.

pub mod callback_chain;
pub mod callbacks;
pub mod config;
pub mod executor;
pub mod retry;
pub mod transport;

pub use callback_chain::CallbackChain;
pub use callbacks::FnValidator;
pub use callbacks::LoggingCallback;
pub use callbacks::StatusValidator;
pub use config::RetryConfig;
pub use config::TransportConfig;
pub use cx_types::ClientError;
pub use cx_types::Result;
pub use executor::RequestExecutor;
pub use executor::RequestExecutorBuilder;
pub use retry::RetryPolicy;
pub use retry::RetryStrategy;
pub use transport::ReqwestTransport;
pub use transport::Transport;
