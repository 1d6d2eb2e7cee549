use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Where a transient I/O failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoOrigin {
    /// The HTTP transport talking to the exchange
    Transport,
    /// The shared counter store backing the rate limiters
    Store,
}

impl fmt::Display for IoOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOrigin::Transport => write!(f, "transport"),
            IoOrigin::Store => write!(f, "counter store"),
        }
    }
}

/// Classification used by retry policies to decide whether a failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connect,
    Timeout,
    Transport,
    Store,
    StoreUnavailable,
    AdmissionRejected,
    CallbackAborted,
    Permanent,
    RetryExhausted,
    DeadlineElapsed,
    Closed,
    InvalidConfig,
    InvalidRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Connect => "connect",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transport => "transport",
            ErrorKind::Store => "store",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::AdmissionRejected => "admission_rejected",
            ErrorKind::CallbackAborted => "callback_aborted",
            ErrorKind::Permanent => "permanent",
            ErrorKind::RetryExhausted => "retry_exhausted",
            ErrorKind::DeadlineElapsed => "deadline_elapsed",
            ErrorKind::Closed => "closed",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::InvalidRequest => "invalid_request",
        };
        f.write_str(name)
    }
}

/// Parameters of the retry policy that gave up, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySummary {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl fmt::Display for RetrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max retries {}/initial delay {:?}/max delay {:?}/backoff factor {}/jitter {}",
            self.max_retries, self.initial_delay, self.max_delay, self.backoff_factor, self.jitter
        )
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("URL pattern limit exceeded: {count}/{max_safe_count} in {window_seconds}s window. Patterns: {}", .patterns.join(", "))]
    AdmissionRejected { count: u64, max_safe_count: u64, window_seconds: u64, patterns: Vec<String> },

    #[error("Retry limit exceeded after {attempts} attempts ({policy}): {source}")]
    RetryExhausted { attempts: u32, policy: RetrySummary, source: Box<ClientError> },

    #[error("{origin} connect error: {message}")]
    Connect { origin: IoOrigin, message: String },

    #[error("{origin} timed out: {message}")]
    Timeout { origin: IoOrigin, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Counter store error: {0}")]
    Store(String),

    #[error("Counter store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("{message}")]
    Permanent { message: String, status_code: Option<u16>, response_body: Option<String> },

    #[error("Request aborted by callback {callback}: {source}")]
    CallbackAborted { callback: String, source: Box<ClientError> },

    #[error("Deadline of {0:?} elapsed")]
    DeadlineElapsed(Duration),

    #[error("Client is closed")]
    Closed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::AdmissionRejected { .. } => ErrorKind::AdmissionRejected,
            ClientError::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            ClientError::Connect { .. } => ErrorKind::Connect,
            ClientError::Timeout { .. } => ErrorKind::Timeout,
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Store(_) => ErrorKind::Store,
            ClientError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            ClientError::Permanent { .. } => ErrorKind::Permanent,
            ClientError::CallbackAborted { .. } => ErrorKind::CallbackAborted,
            ClientError::DeadlineElapsed(_) => ErrorKind::DeadlineElapsed,
            ClientError::Closed => ErrorKind::Closed,
            ClientError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ClientError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Connect and timeout failures, from either the transport or the counter store
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Connect { .. } | ClientError::Timeout { .. })
    }

    /// Unwraps `CallbackAborted` and `RetryExhausted` layers down to the failure that started it.
    pub fn root_cause(&self) -> &ClientError {
        match self {
            ClientError::CallbackAborted { source, .. } | ClientError::RetryExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        ClientError::Permanent { message: message.into(), status_code: None, response_body: None }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
