use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use cx_types::ClientError;
use cx_types::IoOrigin;
use cx_types::Result;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::store::SharedCounterStore;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local counter store
///
/// Same contract as the Redis store but only shared within one process. Expiry follows the
/// tokio clock, so paused-time tests can step across TTLs. Every call is counted.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: DashMap<String, Entry>,
    unreachable: AtomicBool,
    get_calls: AtomicUsize,
    increment_calls: AtomicUsize,
    ping_calls: AtomicUsize,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a connect error (or succeed again)
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Release);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::Acquire)
    }

    pub fn increment_calls(&self) -> usize {
        self.increment_calls.load(Ordering::Acquire)
    }

    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::Acquire)
    }

    /// Total store round trips of any kind
    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.increment_calls() + self.ping_calls()
    }

    /// Live keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self.entries.iter().filter(|e| e.value().is_live(now)).map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Remaining time to live of `key`, `None` when absent or expired
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries.get(key).filter(|e| e.is_live(now)).map(|e| e.expires_at - now)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::Acquire) {
            return Err(ClientError::Connect { origin: IoOrigin::Store, message: "memory store marked unreachable".to_string() });
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<u64> {
        self.get_calls.fetch_add(1, Ordering::AcqRel);
        self.check_reachable()?;

        let now = Instant::now();
        Ok(self.entries.get(key).filter(|e| e.is_live(now)).map(|e| e.count).unwrap_or(0))
    }

    fn increment(&self, key: &str, ttl_seconds: u64) -> Result<u64> {
        self.increment_calls.fetch_add(1, Ordering::AcqRel);
        self.check_reachable()?;

        let now = Instant::now();
        let expires_at = now + Duration::from_secs(ttl_seconds);
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry { count: 0, expires_at });
        if !entry.is_live(now) {
            entry.count = 0;
        }
        entry.count += 1;
        entry.expires_at = expires_at;
        Ok(entry.count)
    }
}

impl SharedCounterStore for MemoryCounterStore {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move { self.read(key) })
    }

    fn increment_and_expire<'a>(&'a self, key: &'a str, ttl_seconds: u64) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>> {
        Box::pin(async move { self.increment(key, ttl_seconds) })
    }

    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.ping_calls.fetch_add(1, Ordering::AcqRel);
            self.check_reachable()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_reads_zero() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.get("RATE_LIMIT:URL_PATTERN:X:WINDOW:1").await.unwrap(), 0);
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_increment_sets_ttl() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.increment_and_expire("k", 600).await.unwrap(), 1);
        assert_eq!(store.increment_and_expire("k", 600).await.unwrap(), 2);
        assert_eq!(store.get("k").await.unwrap(), 2);

        let ttl = store.ttl("k").unwrap();
        assert!(ttl <= Duration::from_secs(600));
        assert!(ttl > Duration::from_secs(590));
        assert_eq!(store.keys(), vec!["k".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryCounterStore::new();
        store.increment_and_expire("k", 10).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(store.get("k").await.unwrap(), 0);
        assert!(store.keys().is_empty());
        assert_eq!(store.increment_and_expire("k", 10).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_errors() {
        let store = MemoryCounterStore::new();
        store.set_unreachable(true);

        let err = store.ping().await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.get("k").await.is_err());
        assert!(store.increment_and_expire("k", 10).await.is_err());
        assert_eq!(store.total_calls(), 3);

        store.set_unreachable(false);
        assert!(store.ping().await.is_ok());
        assert_eq!(store.ping_calls(), 2);
    }
}
