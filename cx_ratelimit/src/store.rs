use std::future::Future;
use std::pin::Pin;

use cx_types::Result;

/// Atomic counter service shared by every process that draws on the same budget
///
/// Implementations never retry; compose a retry strategy outside if needed.
pub trait SharedCounterStore: Send + Sync {
    /// Current value of `key`, 0 when the key does not exist
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>>;

    /// Increment `key` and (re)set its expiry in one transaction, returning the new value
    fn increment_and_expire<'a>(&'a self, key: &'a str, ttl_seconds: u64) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>>;

    /// Connectivity check; an unreachable store is an error, never `Ok(false)`
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
